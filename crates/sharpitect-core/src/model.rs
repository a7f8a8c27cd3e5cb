//! Core data structures for the declaration graph

use serde::{Deserialize, Serialize};

/// Discriminates what kind of declared entity a node represents.
///
/// The integer values are the persisted representation; they are stable and
/// must never be reassigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    // ── Synthetic roots ─────────────────────────────────────
    Solution,
    Project,

    // ── Containers ──────────────────────────────────────────
    Namespace,
    Class,
    Interface,
    Struct,
    Record,
    Enum,
    EnumMember,
    Delegate,

    // ── Members ─────────────────────────────────────────────
    Method,
    Constructor,
    Property,
    Field,
    Event,
    Indexer,

    // ── Locals (emitted only with visit_locals) ─────────────
    Parameter,
    TypeParameter,
    LocalVariable,
    LocalFunction,

    // ── Comment markers ─────────────────────────────────────
    TodoComment,
}

impl NodeKind {
    pub fn as_i64(self) -> i64 {
        match self {
            NodeKind::Solution => 0,
            NodeKind::Project => 1,
            NodeKind::Namespace => 2,
            NodeKind::Class => 3,
            NodeKind::Interface => 4,
            NodeKind::Struct => 5,
            NodeKind::Record => 6,
            NodeKind::Enum => 7,
            NodeKind::EnumMember => 8,
            NodeKind::Delegate => 9,
            NodeKind::Method => 10,
            NodeKind::Constructor => 11,
            NodeKind::Property => 12,
            NodeKind::Field => 13,
            NodeKind::Event => 14,
            NodeKind::Indexer => 15,
            NodeKind::Parameter => 16,
            NodeKind::TypeParameter => 17,
            NodeKind::LocalVariable => 18,
            NodeKind::LocalFunction => 19,
            NodeKind::TodoComment => 20,
        }
    }

    pub fn from_i64(value: i64) -> Option<Self> {
        Some(match value {
            0 => NodeKind::Solution,
            1 => NodeKind::Project,
            2 => NodeKind::Namespace,
            3 => NodeKind::Class,
            4 => NodeKind::Interface,
            5 => NodeKind::Struct,
            6 => NodeKind::Record,
            7 => NodeKind::Enum,
            8 => NodeKind::EnumMember,
            9 => NodeKind::Delegate,
            10 => NodeKind::Method,
            11 => NodeKind::Constructor,
            12 => NodeKind::Property,
            13 => NodeKind::Field,
            14 => NodeKind::Event,
            15 => NodeKind::Indexer,
            16 => NodeKind::Parameter,
            17 => NodeKind::TypeParameter,
            18 => NodeKind::LocalVariable,
            19 => NodeKind::LocalFunction,
            20 => NodeKind::TodoComment,
            _ => return None,
        })
    }

    /// Parse a kind from its display name, case-insensitive.
    pub fn parse(name: &str) -> Option<Self> {
        let lowered = name.to_ascii_lowercase();
        Some(match lowered.as_str() {
            "solution" => NodeKind::Solution,
            "project" => NodeKind::Project,
            "namespace" => NodeKind::Namespace,
            "class" => NodeKind::Class,
            "interface" => NodeKind::Interface,
            "struct" => NodeKind::Struct,
            "record" => NodeKind::Record,
            "enum" => NodeKind::Enum,
            "enummember" => NodeKind::EnumMember,
            "delegate" => NodeKind::Delegate,
            "method" => NodeKind::Method,
            "constructor" => NodeKind::Constructor,
            "property" => NodeKind::Property,
            "field" => NodeKind::Field,
            "event" => NodeKind::Event,
            "indexer" => NodeKind::Indexer,
            "parameter" => NodeKind::Parameter,
            "typeparameter" => NodeKind::TypeParameter,
            "localvariable" => NodeKind::LocalVariable,
            "localfunction" => NodeKind::LocalFunction,
            "todocomment" => NodeKind::TodoComment,
            _ => return None,
        })
    }

    /// True for kinds that can carry a component annotation.
    pub fn is_type_like(self) -> bool {
        matches!(
            self,
            NodeKind::Class
                | NodeKind::Interface
                | NodeKind::Struct
                | NodeKind::Record
                | NodeKind::Enum
                | NodeKind::Delegate
        )
    }
}

/// What kind of relationship this edge represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    /// Lexical nesting: namespace→type, type→member, member→local.
    Contains,
    Inherits,
    Implements,
    Overrides,
    Calls,
    Constructs,
    /// A member's signature mentions a workspace type.
    References,
    /// A member reads or writes a field or property.
    Uses,
    /// Project-to-project reference.
    DependsOn,
}

impl EdgeKind {
    pub fn as_i64(self) -> i64 {
        match self {
            EdgeKind::Contains => 0,
            EdgeKind::Inherits => 1,
            EdgeKind::Implements => 2,
            EdgeKind::Overrides => 3,
            EdgeKind::Calls => 4,
            EdgeKind::Constructs => 5,
            EdgeKind::References => 6,
            EdgeKind::Uses => 7,
            EdgeKind::DependsOn => 8,
        }
    }

    pub fn from_i64(value: i64) -> Option<Self> {
        Some(match value {
            0 => EdgeKind::Contains,
            1 => EdgeKind::Inherits,
            2 => EdgeKind::Implements,
            3 => EdgeKind::Overrides,
            4 => EdgeKind::Calls,
            5 => EdgeKind::Constructs,
            6 => EdgeKind::References,
            7 => EdgeKind::Uses,
            8 => EdgeKind::DependsOn,
            _ => return None,
        })
    }

    pub fn parse(name: &str) -> Option<Self> {
        let lowered = name.to_ascii_lowercase();
        Some(match lowered.as_str() {
            "contains" => EdgeKind::Contains,
            "inherits" => EdgeKind::Inherits,
            "implements" => EdgeKind::Implements,
            "overrides" => EdgeKind::Overrides,
            "calls" => EdgeKind::Calls,
            "constructs" => EdgeKind::Constructs,
            "references" => EdgeKind::References,
            "uses" => EdgeKind::Uses,
            "dependson" => EdgeKind::DependsOn,
            _ => return None,
        })
    }
}

/// Architecture level from a recognised component annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ArchLevel {
    #[default]
    None,
    System,
    Container,
    Component,
    Code,
}

impl ArchLevel {
    pub fn as_i64(self) -> i64 {
        match self {
            ArchLevel::None => 0,
            ArchLevel::System => 1,
            ArchLevel::Container => 2,
            ArchLevel::Component => 3,
            ArchLevel::Code => 4,
        }
    }

    pub fn from_i64(value: i64) -> Self {
        match value {
            1 => ArchLevel::System,
            2 => ArchLevel::Container,
            3 => ArchLevel::Component,
            4 => ArchLevel::Code,
            _ => ArchLevel::None,
        }
    }
}

/// A single declared entity in the source tree.
///
/// The id is globally unique and doubles as the primary key: the
/// fully-qualified display form for semantic entities
/// (`Ns.Outer.Inner.Method(int, string)`), the bare solution/project name
/// for synthetic roots, and `{owner}$TODO#{line}` for comment markers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclarationNode {
    pub id: String,
    /// Unqualified display name (`Method`, `.ctor`, `this[]`).
    pub name: String,
    pub kind: NodeKind,
    /// Workspace-relative path, forward-slash separated. For
    /// Solution/Project nodes, the path of the manifest file.
    pub file_path: String,
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
    pub arch_level: ArchLevel,
    pub arch_description: Option<String>,
    /// Kind-specific JSON payload.
    pub metadata: Option<String>,
}

impl DeclarationNode {
    /// A node whose source range is the synthetic `(1,1,1,1)`.
    pub fn synthetic(id: impl Into<String>, name: impl Into<String>, kind: NodeKind, file_path: impl Into<String>) -> Self {
        DeclarationNode {
            id: id.into(),
            name: name.into(),
            kind,
            file_path: file_path.into(),
            start_line: 1,
            start_column: 1,
            end_line: 1,
            end_column: 1,
            arch_level: ArchLevel::None,
            arch_description: None,
            metadata: None,
        }
    }
}

/// A directed, typed relation between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipEdge {
    /// Opaque unique id (UUID).
    pub id: String,
    pub source_id: String,
    pub target_id: String,
    pub kind: EdgeKind,
    /// File that produced the edge; drives incremental deletion.
    pub source_file_path: Option<String>,
    /// 1-based line of the edge's textual origin.
    pub source_line: Option<u32>,
    pub metadata: Option<String>,
}

/// Metadata payload carried by `TodoComment` nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentMarker {
    pub comment_type: String,
    pub text: String,
}
