//! Structured tool protocol served over stdio
//!
//! One JSON request per line: `{"tool": "...", "arguments": {...}}`. One
//! JSON response per line: the tool result (default), a
//! `{"format":"text","content":"..."}` wrapper when the call asks for text,
//! or `{"error":true,"error_code":"...","message":"..."}` — tools report
//! failures as data instead of failing the transport.

use crate::output;
use serde::Deserialize;
use serde_json::{json, Value};
use sharpitect_core::model::{EdgeKind, NodeKind};
use sharpitect_core::SharpitectError;
use sharpitect_store::navigation::{Direction, InheritanceDirection, MatchMode, UsageKind};
use sharpitect_store::NavigationService;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[derive(Debug, Deserialize)]
struct ToolRequest {
    tool: String,
    #[serde(default)]
    arguments: Value,
}

pub async fn serve_stdio(service: NavigationService) -> anyhow::Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    let mut lines = stdin.lines();

    tracing::info!("serving tool protocol on stdio");
    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<ToolRequest>(&line) {
            Ok(request) => dispatch(&service, &request.tool, &request.arguments),
            Err(e) => error_object("validation_error", &format!("bad request: {e}")),
        };
        let mut serialized = serde_json::to_string(&response)?;
        serialized.push('\n');
        stdout.write_all(serialized.as_bytes()).await?;
        stdout.flush().await?;
    }
    Ok(())
}

fn dispatch(service: &NavigationService, tool: &str, args: &Value) -> Value {
    match run_tool(service, tool, args) {
        Ok(value) => value,
        Err(ToolError::NotFound(id)) => error_object("not_found", &format!("not found: {id}")),
        Err(ToolError::Validation(message)) => error_object("validation_error", &message),
        Err(ToolError::Internal(e)) => error_object(e.code(), &e.to_string()),
    }
}

fn error_object(code: &str, message: &str) -> Value {
    json!({ "error": true, "error_code": code, "message": message })
}

enum ToolError {
    NotFound(String),
    Validation(String),
    Internal(SharpitectError),
}

impl From<SharpitectError> for ToolError {
    fn from(e: SharpitectError) -> Self {
        ToolError::Internal(e)
    }
}

type ToolResult = Result<Value, ToolError>;

fn run_tool(service: &NavigationService, tool: &str, args: &Value) -> ToolResult {
    let text_format = args.get("format").and_then(Value::as_str) == Some("text");

    macro_rules! respond {
        ($value:expr, $render:expr) => {{
            let value = $value;
            if text_format {
                Ok(json!({ "format": "text", "content": $render(&value) }))
            } else {
                serde_json::to_value(&value).map_err(|e| ToolError::Validation(e.to_string()))
            }
        }};
    }

    match tool {
        "search" => {
            let query = required_str(args, "query")?;
            let mode = match args.get("match").and_then(Value::as_str) {
                Some(raw) => MatchMode::parse(raw)
                    .ok_or_else(|| ToolError::Validation(format!("unknown match mode '{raw}'")))?,
                None => MatchMode::Contains,
            };
            let kind = optional_node_kind(args)?;
            let case_sensitive = args
                .get("case_sensitive")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            let limit = limit_arg(args);
            let outcome = service.search(query, mode, kind, case_sensitive, limit)?;
            respond!(outcome, output::search)
        }
        "get_node" => {
            let id = required_str(args, "id")?;
            let node = service
                .node(id)?
                .ok_or_else(|| ToolError::NotFound(id.to_string()))?;
            respond!(node, output::node_line)
        }
        "get_children" => {
            let id = required_str(args, "id")?;
            let kind = optional_node_kind(args)?;
            let children = service
                .children(id, kind, limit_arg(args))?
                .ok_or_else(|| ToolError::NotFound(id.to_string()))?;
            respond!(children, |v: &Vec<_>| output::node_list(v))
        }
        "get_ancestors" => {
            let id = required_str(args, "id")?;
            let chain = service
                .ancestors(id)?
                .ok_or_else(|| ToolError::NotFound(id.to_string()))?;
            respond!(chain, |v: &Vec<_>| output::node_list(v))
        }
        "get_relationships" => {
            let id = required_str(args, "id")?;
            let direction = match args.get("direction").and_then(Value::as_str) {
                Some(raw) => Direction::parse(raw)
                    .ok_or_else(|| ToolError::Validation(format!("unknown direction '{raw}'")))?,
                None => Direction::Both,
            };
            let kind = optional_edge_kind(args)?;
            let relationships = service
                .relationships(id, direction, kind, limit_arg(args))?
                .ok_or_else(|| ToolError::NotFound(id.to_string()))?;
            respond!(relationships, |v: &Vec<_>| output::relationships(v))
        }
        "get_callers" => {
            let id = required_str(args, "id")?;
            let hits = service
                .callers(id, depth_arg(args, 1), limit_arg(args))?
                .ok_or_else(|| ToolError::NotFound(id.to_string()))?;
            respond!(hits, |v: &Vec<_>| output::traversal(v))
        }
        "get_callees" => {
            let id = required_str(args, "id")?;
            let hits = service
                .callees(id, depth_arg(args, 1), limit_arg(args))?
                .ok_or_else(|| ToolError::NotFound(id.to_string()))?;
            respond!(hits, |v: &Vec<_>| output::traversal(v))
        }
        "get_inheritance" => {
            let id = required_str(args, "id")?;
            let direction = match args.get("direction").and_then(Value::as_str) {
                Some(raw) => InheritanceDirection::parse(raw)
                    .ok_or_else(|| ToolError::Validation(format!("unknown direction '{raw}'")))?,
                None => InheritanceDirection::Both,
            };
            let hits = service
                .inheritance(id, direction, depth_arg(args, 3))?
                .ok_or_else(|| ToolError::NotFound(id.to_string()))?;
            respond!(hits, |v: &Vec<_>| output::traversal(v))
        }
        "get_usages" => {
            let id = required_str(args, "id")?;
            let usage_kind = match args.get("kind").and_then(Value::as_str) {
                Some(raw) => UsageKind::parse(raw)
                    .ok_or_else(|| ToolError::Validation(format!("unknown usage kind '{raw}'")))?,
                None => UsageKind::All,
            };
            let usages = service
                .usages(id, usage_kind, limit_arg(args))?
                .ok_or_else(|| ToolError::NotFound(id.to_string()))?;
            respond!(usages, |v: &Vec<_>| output::relationships(v))
        }
        "get_dependencies" => {
            let id = required_str(args, "id")?;
            let transitive = args.get("transitive").and_then(Value::as_bool).unwrap_or(false);
            let projects = service
                .dependencies(id, transitive)?
                .ok_or_else(|| ToolError::NotFound(id.to_string()))?;
            respond!(projects, |v: &Vec<_>| output::node_list(v))
        }
        "get_dependents" => {
            let id = required_str(args, "id")?;
            let transitive = args.get("transitive").and_then(Value::as_bool).unwrap_or(false);
            let projects = service
                .dependents(id, transitive)?
                .ok_or_else(|| ToolError::NotFound(id.to_string()))?;
            respond!(projects, |v: &Vec<_>| output::node_list(v))
        }
        "list_by_kind" => {
            let raw = required_str(args, "kind")?;
            let kind = NodeKind::parse(raw)
                .ok_or_else(|| ToolError::Validation(format!("unknown node kind '{raw}'")))?;
            let scope = args.get("scope").and_then(Value::as_str);
            let nodes = service
                .list_by_kind(kind, scope, limit_arg(args))?
                .ok_or_else(|| ToolError::NotFound(scope.unwrap_or_default().to_string()))?;
            respond!(nodes, |v: &Vec<_>| output::node_list(v))
        }
        "get_file_declarations" => {
            let path = required_str(args, "path")?;
            let nodes = service.file_declarations(path)?;
            respond!(nodes, |v: &Vec<_>| output::node_list(v))
        }
        "get_signature" => {
            let id = required_str(args, "id")?;
            let snippet = service
                .signature(id)?
                .ok_or_else(|| ToolError::NotFound(id.to_string()))?;
            respond!(snippet, output::snippet)
        }
        "get_code" => {
            let id = required_str(args, "id")?;
            let snippet = service
                .code(id)?
                .ok_or_else(|| ToolError::NotFound(id.to_string()))?;
            respond!(snippet, output::snippet)
        }
        "get_tree" => {
            let id = required_str(args, "id")?;
            let kind = optional_node_kind(args)?;
            let tree = service
                .tree(id, kind, depth_arg(args, 3))?
                .ok_or_else(|| ToolError::NotFound(id.to_string()))?;
            respond!(tree, output::tree)
        }
        "get_stats" => {
            let stats = service.stats()?;
            respond!(stats, output::stats)
        }
        other => Err(ToolError::Validation(format!("unknown tool '{other}'"))),
    }
}

fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::Validation(format!("missing argument '{key}'")))
}

fn optional_node_kind(args: &Value) -> Result<Option<NodeKind>, ToolError> {
    match args.get("kind").and_then(Value::as_str) {
        None => Ok(None),
        Some(raw) => NodeKind::parse(raw)
            .map(Some)
            .ok_or_else(|| ToolError::Validation(format!("unknown node kind '{raw}'"))),
    }
}

fn optional_edge_kind(args: &Value) -> Result<Option<EdgeKind>, ToolError> {
    match args.get("kind").and_then(Value::as_str) {
        None => Ok(None),
        Some(raw) => EdgeKind::parse(raw)
            .map(Some)
            .ok_or_else(|| ToolError::Validation(format!("unknown edge kind '{raw}'"))),
    }
}

fn limit_arg(args: &Value) -> usize {
    args.get("limit")
        .and_then(Value::as_u64)
        .map(|l| l as usize)
        .unwrap_or(sharpitect_store::DEFAULT_LIMIT)
}

fn depth_arg(args: &Value, default: u32) -> u32 {
    args.get("depth")
        .and_then(Value::as_u64)
        .map(|d| d as u32)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sharpitect_core::model::{ArchLevel, DeclarationNode};
    use sharpitect_store::GraphRepository;
    use std::sync::Arc;

    fn service_with_one_node() -> NavigationService {
        let repo = Arc::new(GraphRepository::open_in_memory().unwrap());
        repo.upsert_node(&DeclarationNode {
            id: "N.A".to_string(),
            name: "A".to_string(),
            kind: NodeKind::Class,
            file_path: "a.cs".to_string(),
            start_line: 1,
            start_column: 1,
            end_line: 1,
            end_column: 1,
            arch_level: ArchLevel::None,
            arch_description: None,
            metadata: None,
        })
        .unwrap();
        NavigationService::new(repo, std::path::PathBuf::from("."))
    }

    #[test]
    fn unknown_tool_is_a_validation_error_object() {
        let service = service_with_one_node();
        let response = dispatch(&service, "bogus", &json!({}));
        assert_eq!(response["error"], json!(true));
        assert_eq!(response["error_code"], json!("validation_error"));
    }

    #[test]
    fn missing_id_reports_not_found_without_failing() {
        let service = service_with_one_node();
        let response = dispatch(&service, "get_node", &json!({"id": "ghost"}));
        assert_eq!(response["error"], json!(true));
        assert_eq!(response["error_code"], json!("not_found"));
    }

    #[test]
    fn json_is_the_default_format() {
        let service = service_with_one_node();
        let response = dispatch(&service, "get_node", &json!({"id": "N.A"}));
        assert_eq!(response["id"], json!("N.A"));
        assert_eq!(response["kind"], json!("Class"));
    }

    #[test]
    fn text_format_wraps_rendered_output() {
        let service = service_with_one_node();
        let response = dispatch(&service, "get_node", &json!({"id": "N.A", "format": "text"}));
        assert_eq!(response["format"], json!("text"));
        let content = response["content"].as_str().unwrap();
        assert!(content.contains("N.A"));
        assert!(content.contains("Class"));
    }

    #[test]
    fn search_tool_reports_truncation() {
        let service = service_with_one_node();
        let response = dispatch(&service, "search", &json!({"query": "A", "limit": 0}));
        assert_eq!(response["total_count"], json!(1));
        assert_eq!(response["truncated"], json!(true));
        assert_eq!(response["results"], json!([]));
    }
}
