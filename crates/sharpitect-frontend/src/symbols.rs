//! Compilation-wide symbol index

use dashmap::DashMap;
use sharpitect_core::NodeKind;

/// Named argument metadata from an attribute list.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeData {
    pub name: String,
    pub named_args: Vec<(String, String)>,
}

impl AttributeData {
    pub fn named_arg(&self, name: &str) -> Option<&str> {
        self.named_args
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// One declared symbol: the fully-qualified display key plus whatever the
/// binder needs to resolve references through it.
#[derive(Debug, Clone)]
pub struct SymbolEntry {
    /// Fully-qualified display form; identical to the node id the walkers emit.
    pub key: String,
    /// Unqualified display name (`Method`, `.ctor`, `this[]`).
    pub name: String,
    pub kind: NodeKind,
    /// Key of the containing namespace or type.
    pub container: Option<String>,
    /// Written display of the member's return/property/field type.
    pub member_type: Option<String>,
    /// Parameter count for methods, constructors, and indexers.
    pub param_count: Option<usize>,
    pub is_override: bool,
    /// Resolved base type keys; populated for type-like entries only.
    pub bases: Vec<String>,
    /// Attribute metadata; populated for type-like entries only.
    pub attributes: Vec<AttributeData>,
}

/// Thread-safe symbol index for one compilation, keyed by fully-qualified
/// display form. Keeps a per-file map so incremental refresh can drop one
/// document's entries.
#[derive(Debug, Default)]
pub struct SymbolIndex {
    entries: DashMap<String, SymbolEntry>,
    /// container key -> member keys, in declaration order
    members: DashMap<String, Vec<String>>,
    /// simple type name (generic suffix stripped) -> type keys
    types_by_name: DashMap<String, Vec<String>>,
    /// relative path -> keys declared in that file
    by_file: DashMap<String, Vec<String>>,
}

impl SymbolIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, entry: SymbolEntry, file: &str) {
        if let Some(container) = &entry.container {
            let mut members = self.members.entry(container.clone()).or_default();
            if !members.contains(&entry.key) {
                members.push(entry.key.clone());
            }
        }
        if entry.kind.is_type_like() {
            let simple = strip_generic_suffix(&entry.name);
            let mut named = self.types_by_name.entry(simple.to_string()).or_default();
            if !named.contains(&entry.key) {
                named.push(entry.key.clone());
            }
        }
        self.by_file
            .entry(file.to_string())
            .or_default()
            .push(entry.key.clone());
        self.entries.insert(entry.key.clone(), entry);
    }

    pub fn get(&self, key: &str) -> Option<SymbolEntry> {
        self.entries.get(key).map(|e| e.value().clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Member entries of a namespace or type, in declaration order.
    pub fn members_of(&self, container: &str) -> Vec<SymbolEntry> {
        self.members
            .get(container)
            .map(|keys| keys.iter().filter_map(|k| self.get(k)).collect())
            .unwrap_or_default()
    }

    /// Type entries sharing a simple name (generic suffix ignored).
    pub fn types_named(&self, simple_name: &str) -> Vec<SymbolEntry> {
        self.types_by_name
            .get(strip_generic_suffix(simple_name))
            .map(|keys| keys.iter().filter_map(|k| self.get(k)).collect())
            .unwrap_or_default()
    }

    /// Drop every entry declared in `file`. Used by incremental refresh.
    pub fn remove_file(&self, file: &str) {
        let Some((_, keys)) = self.by_file.remove(file) else {
            return;
        };
        for key in keys {
            let Some((_, entry)) = self.entries.remove(&key) else {
                continue;
            };
            if let Some(container) = &entry.container {
                if let Some(mut members) = self.members.get_mut(container) {
                    members.retain(|k| k != &key);
                }
            }
            if entry.kind.is_type_like() {
                let simple = strip_generic_suffix(&entry.name).to_string();
                if let Some(mut named) = self.types_by_name.get_mut(&simple) {
                    named.retain(|k| k != &key);
                }
            }
        }
    }

    /// Overwrite the resolved base list of a type entry.
    pub fn set_bases(&self, key: &str, bases: Vec<String>) {
        if let Some(mut entry) = self.entries.get_mut(key) {
            entry.bases = bases;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.key().clone()).collect()
    }
}

/// `List<T>` -> `List`; names without a generic list pass through.
pub fn strip_generic_suffix(name: &str) -> &str {
    match name.find('<') {
        Some(pos) => &name[..pos],
        None => name,
    }
}

/// C# predefined types and their `System` aliases carry a special-type mark
/// and never become reference targets.
pub fn is_primitive_type(name: &str) -> bool {
    let bare = name
        .trim()
        .trim_end_matches('?')
        .trim_start_matches("System.");
    matches!(
        bare,
        "bool" | "byte" | "sbyte" | "char" | "decimal" | "double" | "float" | "int" | "uint"
            | "long" | "ulong" | "short" | "ushort" | "string" | "object" | "void" | "nint"
            | "nuint" | "dynamic" | "var"
            | "Boolean" | "Byte" | "SByte" | "Char" | "Decimal" | "Double" | "Single" | "Int32"
            | "UInt32" | "Int64" | "UInt64" | "Int16" | "UInt16" | "String" | "Object" | "Void"
    )
}
