//! CLI command implementations

use crate::output;
use anyhow::{bail, Context};
use sharpitect_analyzer::{analyze_solution, AnalyzerOptions};
use sharpitect_core::model::{EdgeKind, NodeKind};
use sharpitect_core::CancelFlag;
use sharpitect_store::navigation::{Direction, InheritanceDirection, MatchMode, UsageKind};
use sharpitect_store::{GraphRepository, NavigationService};
use sharpitect_watcher::{IncrementalUpdateService, UpdateOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub async fn analyze(path: PathBuf, db: PathBuf, watch: bool, visit_locals: bool) -> anyhow::Result<()> {
    tracing::info!("analyzing {}", path.display());
    let repo = Arc::new(GraphRepository::open(&db)?);
    let options = AnalyzerOptions { visit_locals };
    let analysis = analyze_solution(&path, &repo, &options, &CancelFlag::new())?;
    println!(
        "Analyzed {} projects: {} nodes, {} edges in {}ms -> {}",
        analysis.stats.projects,
        analysis.stats.node_count,
        analysis.stats.edge_count,
        analysis.stats.duration_ms,
        db.display()
    );

    if !watch {
        return Ok(());
    }

    let update_options = UpdateOptions {
        visit_locals,
        ..UpdateOptions::default()
    };
    let mut service = IncrementalUpdateService::new(analysis, repo, update_options);
    let mut events = service.subscribe();
    service.start()?;
    tracing::info!("watching for changes, Ctrl-C to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => {
                if let Ok(event) = event {
                    tracing::info!(
                        "updated {:?}: +{}/-{} nodes, +{}/-{} edges in {}ms",
                        event.updated_files,
                        event.nodes_added,
                        event.nodes_removed,
                        event.edges_added,
                        event.edges_removed,
                        event.duration_ms
                    );
                }
            }
        }
    }
    service.stop().await;
    Ok(())
}

pub async fn serve(db: PathBuf) -> anyhow::Result<()> {
    let service = open_navigation(&db)?;
    crate::tools::serve_stdio(service).await
}

pub fn search(
    db: &Path,
    query: &str,
    match_mode: &str,
    kind: Option<&str>,
    case_sensitive: bool,
    limit: usize,
    json: bool,
) -> anyhow::Result<()> {
    let mode = MatchMode::parse(match_mode)
        .with_context(|| format!("unknown match mode '{match_mode}'"))?;
    let kind = parse_node_kind(kind)?;
    let service = open_navigation(db)?;
    let outcome = service.search(query, mode, kind, case_sensitive, limit)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!("{}", output::search(&outcome));
    }
    Ok(())
}

pub fn node(db: &Path, id: &str, json: bool) -> anyhow::Result<()> {
    let service = open_navigation(db)?;
    let Some(node) = service.node(id)? else {
        bail!("not found: {id}");
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&node)?);
    } else {
        println!("{}", output::node_line(&node));
    }
    Ok(())
}

pub fn children(db: &Path, id: &str, kind: Option<&str>, limit: usize, json: bool) -> anyhow::Result<()> {
    let kind = parse_node_kind(kind)?;
    let service = open_navigation(db)?;
    let Some(children) = service.children(id, kind, limit)? else {
        bail!("not found: {id}");
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&children)?);
    } else {
        println!("{}", output::node_list(&children));
    }
    Ok(())
}

pub fn ancestors(db: &Path, id: &str, json: bool) -> anyhow::Result<()> {
    let service = open_navigation(db)?;
    let Some(chain) = service.ancestors(id)? else {
        bail!("not found: {id}");
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&chain)?);
    } else {
        println!("{}", output::node_list(&chain));
    }
    Ok(())
}

pub fn relationships(
    db: &Path,
    id: &str,
    direction: &str,
    kind: Option<&str>,
    limit: usize,
    json: bool,
) -> anyhow::Result<()> {
    let direction = Direction::parse(direction)
        .with_context(|| format!("unknown direction '{direction}'"))?;
    let kind = parse_edge_kind(kind)?;
    let service = open_navigation(db)?;
    let Some(relationships) = service.relationships(id, direction, kind, limit)? else {
        bail!("not found: {id}");
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&relationships)?);
    } else {
        println!("{}", output::relationships(&relationships));
    }
    Ok(())
}

pub fn callers(db: &Path, id: &str, depth: u32, limit: usize, json: bool) -> anyhow::Result<()> {
    let service = open_navigation(db)?;
    let Some(hits) = service.callers(id, depth, limit)? else {
        bail!("not found: {id}");
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
    } else {
        println!("{}", output::traversal(&hits));
    }
    Ok(())
}

pub fn callees(db: &Path, id: &str, depth: u32, limit: usize, json: bool) -> anyhow::Result<()> {
    let service = open_navigation(db)?;
    let Some(hits) = service.callees(id, depth, limit)? else {
        bail!("not found: {id}");
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
    } else {
        println!("{}", output::traversal(&hits));
    }
    Ok(())
}

pub fn inheritance(db: &Path, id: &str, direction: &str, depth: u32, json: bool) -> anyhow::Result<()> {
    let direction = InheritanceDirection::parse(direction)
        .with_context(|| format!("unknown direction '{direction}'"))?;
    let service = open_navigation(db)?;
    let Some(hits) = service.inheritance(id, direction, depth)? else {
        bail!("not found: {id}");
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
    } else {
        println!("{}", output::traversal(&hits));
    }
    Ok(())
}

pub fn usages(db: &Path, id: &str, kind: &str, limit: usize, json: bool) -> anyhow::Result<()> {
    let usage_kind = UsageKind::parse(kind)
        .with_context(|| format!("unknown usage kind '{kind}'"))?;
    let service = open_navigation(db)?;
    let Some(usages) = service.usages(id, usage_kind, limit)? else {
        bail!("not found: {id}");
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&usages)?);
    } else {
        println!("{}", output::relationships(&usages));
    }
    Ok(())
}

pub fn signature(db: &Path, id: &str, json: bool) -> anyhow::Result<()> {
    let service = open_navigation(db)?;
    let Some(snippet) = service.signature(id)? else {
        bail!("not found: {id}");
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&snippet)?);
    } else {
        println!("{}", output::snippet(&snippet));
    }
    Ok(())
}

pub fn code(db: &Path, id: &str, json: bool) -> anyhow::Result<()> {
    let service = open_navigation(db)?;
    let Some(snippet) = service.code(id)? else {
        bail!("not found: {id}");
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&snippet)?);
    } else {
        println!("{}", output::snippet(&snippet));
    }
    Ok(())
}

pub fn tree(db: &Path, id: &str, kind: Option<&str>, depth: u32, json: bool) -> anyhow::Result<()> {
    let kind = parse_node_kind(kind)?;
    let service = open_navigation(db)?;
    let Some(tree) = service.tree(id, kind, depth)? else {
        bail!("not found: {id}");
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&tree)?);
    } else {
        println!("{}", output::tree(&tree));
    }
    Ok(())
}

pub fn dependencies(db: &Path, id: &str, transitive: bool, json: bool) -> anyhow::Result<()> {
    let service = open_navigation(db)?;
    let Some(projects) = service.dependencies(id, transitive)? else {
        bail!("not found: {id}");
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&projects)?);
    } else {
        println!("{}", output::node_list(&projects));
    }
    Ok(())
}

pub fn dependents(db: &Path, id: &str, transitive: bool, json: bool) -> anyhow::Result<()> {
    let service = open_navigation(db)?;
    let Some(projects) = service.dependents(id, transitive)? else {
        bail!("not found: {id}");
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&projects)?);
    } else {
        println!("{}", output::node_list(&projects));
    }
    Ok(())
}

pub fn list(db: &Path, kind: &str, scope: Option<&str>, limit: usize, json: bool) -> anyhow::Result<()> {
    let kind = NodeKind::parse(kind).with_context(|| format!("unknown node kind '{kind}'"))?;
    let service = open_navigation(db)?;
    let Some(nodes) = service.list_by_kind(kind, scope, limit)? else {
        bail!("scope not found: {}", scope.unwrap_or_default());
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&nodes)?);
    } else {
        println!("{}", output::node_list(&nodes));
    }
    Ok(())
}

pub fn file(db: &Path, path: &str, json: bool) -> anyhow::Result<()> {
    let service = open_navigation(db)?;
    let nodes = service.file_declarations(path)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&nodes)?);
    } else {
        println!("{}", output::node_list(&nodes));
    }
    Ok(())
}

pub fn stats(db: &Path, json: bool) -> anyhow::Result<()> {
    let service = open_navigation(db)?;
    let stats = service.stats()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("{}", output::stats(&stats));
    }
    Ok(())
}

/// Open the store for reading; a missing database is a hard error rather
/// than an implicitly-created empty graph.
pub fn open_navigation(db: &Path) -> anyhow::Result<NavigationService> {
    if !db.exists() {
        bail!(
            "graph database not found at {} (run `sharpitect analyze` first)",
            db.display()
        );
    }
    let repo = Arc::new(GraphRepository::open(db)?);
    Ok(NavigationService::new(repo, workspace_root_for(db)))
}

/// `<root>/.sharpitect/graph.db` resolves snippets against `<root>`.
fn workspace_root_for(db: &Path) -> PathBuf {
    let dir = db.parent().unwrap_or(Path::new("."));
    if dir.file_name().and_then(|n| n.to_str()) == Some(".sharpitect") {
        dir.parent().unwrap_or(Path::new(".")).to_path_buf()
    } else {
        dir.to_path_buf()
    }
}

fn parse_node_kind(kind: Option<&str>) -> anyhow::Result<Option<NodeKind>> {
    match kind {
        None => Ok(None),
        Some(name) => NodeKind::parse(name)
            .map(Some)
            .with_context(|| format!("unknown node kind '{name}'")),
    }
}

fn parse_edge_kind(kind: Option<&str>) -> anyhow::Result<Option<EdgeKind>> {
    match kind {
        None => Ok(None),
        Some(name) => EdgeKind::parse(name)
            .map(Some)
            .with_context(|| format!("unknown edge kind '{name}'")),
    }
}
