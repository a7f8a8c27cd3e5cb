//! Incremental update service: keeps graph, dependency tracker, and
//! repository mutually consistent under a stream of file changes

use crate::watcher::{ChangeKind, FileChange, FileChangeWatcher, DEFAULT_DEBOUNCE};
use serde::Serialize;
use sharpitect_analyzer::{analyze_file, AnalyzerOptions, SolutionAnalysis};
use sharpitect_core::model::{EdgeKind, NodeKind, RelationshipEdge};
use sharpitect_core::{paths, CancelFlag, DependencyTracker, Graph, Result};
use sharpitect_store::GraphRepository;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Service lifecycle: `Stopped → Starting → Watching ↔ Updating → Stopping`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Stopped,
    Starting,
    Watching,
    Updating,
    Stopping,
}

impl ServiceState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ServiceState::Starting,
            2 => ServiceState::Watching,
            3 => ServiceState::Updating,
            4 => ServiceState::Stopping,
            _ => ServiceState::Stopped,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            ServiceState::Stopped => 0,
            ServiceState::Starting => 1,
            ServiceState::Watching => 2,
            ServiceState::Updating => 3,
            ServiceState::Stopping => 4,
        }
    }
}

/// Summary emitted after each processed batch.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateCompleted {
    pub updated_files: Vec<String>,
    pub nodes_added: usize,
    pub nodes_removed: usize,
    pub edges_added: usize,
    pub edges_removed: usize,
    pub duration_ms: u128,
}

#[derive(Debug, Clone)]
pub struct UpdateOptions {
    /// Re-analyse files referencing changed nodes (one round, no recursion).
    pub cascade: bool,
    pub debounce: Duration,
    pub visit_locals: bool,
}

impl Default for UpdateOptions {
    fn default() -> Self {
        UpdateOptions {
            cascade: true,
            debounce: DEFAULT_DEBOUNCE,
            visit_locals: false,
        }
    }
}

/// The mutable analysis state: live workspace, symbol map, id set,
/// in-memory graph, and reverse dependency index. Exclusively owned by
/// whoever is applying a batch.
struct UpdateState {
    workspace: sharpitect_frontend::CSharpWorkspace,
    symbol_map: sharpitect_analyzer::SymbolMap,
    known_ids: sharpitect_analyzer::KnownIds,
    graph: Graph,
    deps: DependencyTracker,
}

/// Owns the live workspace after a watch-mode analysis and applies
/// file-change batches strictly in arrival order. Within a batch, deletions
/// run first, then re-analysis, then one cascade round over dependents.
pub struct IncrementalUpdateService {
    state: Arc<AtomicU8>,
    cancel: CancelFlag,
    events_tx: broadcast::Sender<UpdateCompleted>,
    watcher: FileChangeWatcher,
    worker: Option<JoinHandle<()>>,
    // present until `start` moves it into the worker
    analysis: Option<UpdateState>,
    repo: Arc<GraphRepository>,
    options: UpdateOptions,
    root: PathBuf,
}

impl IncrementalUpdateService {
    /// Build the service around a finished watch-mode analysis. Seeds the
    /// in-memory graph and the dependency tracker from the analysed rows.
    pub fn new(analysis: SolutionAnalysis, repo: Arc<GraphRepository>, options: UpdateOptions) -> Self {
        let root = analysis.workspace.root().to_path_buf();
        let mut graph = Graph::new();
        for node in &analysis.nodes {
            graph.upsert_node(node.clone());
        }
        let mut deps = DependencyTracker::new();
        for edge in &analysis.edges {
            graph.add_edge(edge.clone());
            if edge.kind != EdgeKind::Contains {
                if let Some(file) = &edge.source_file_path {
                    deps.record_reference(Path::new(file), &edge.target_id);
                }
            }
        }

        let (events_tx, _) = broadcast::channel(64);
        IncrementalUpdateService {
            state: Arc::new(AtomicU8::new(ServiceState::Stopped.as_u8())),
            cancel: CancelFlag::new(),
            events_tx,
            watcher: FileChangeWatcher::new("cs", options.debounce),
            worker: None,
            analysis: Some(UpdateState {
                workspace: analysis.workspace,
                symbol_map: analysis.symbol_map,
                known_ids: analysis.known_ids,
                graph,
                deps,
            }),
            repo,
            options,
            root,
        }
    }

    pub fn state(&self) -> ServiceState {
        ServiceState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UpdateCompleted> {
        self.events_tx.subscribe()
    }

    /// Apply one batch synchronously. Only valid while the background
    /// worker is not running; the watch loop uses the same code path.
    pub fn apply_batch(&mut self, batch: &[FileChange]) -> Result<UpdateCompleted> {
        let state = self
            .analysis
            .as_mut()
            .ok_or_else(|| sharpitect_core::SharpitectError::Validation(
                "service is running; batches are applied by the watch loop".to_string(),
            ))?;
        let mut processor = BatchProcessor {
            state,
            repo: &self.repo,
            options: &self.options,
            root: &self.root,
            cancel: &self.cancel,
        };
        processor.process(batch)
    }

    /// Begin watching the workspace root and processing batches.
    pub fn start(&mut self) -> Result<()> {
        if self.state() != ServiceState::Stopped {
            return Ok(());
        }
        self.state.store(ServiceState::Starting.as_u8(), Ordering::SeqCst);

        let batch_rx = self.watcher.start(&self.root)?;
        let state = self
            .analysis
            .take()
            .expect("update state present before start");

        let worker = UpdateWorker {
            state,
            repo: self.repo.clone(),
            options: self.options.clone(),
            root: self.root.clone(),
            service_state: self.state.clone(),
            cancel: self.cancel.clone(),
            events_tx: self.events_tx.clone(),
        };
        self.worker = Some(tokio::spawn(worker.run(batch_rx)));

        self.state.store(ServiceState::Watching.as_u8(), Ordering::SeqCst);
        info!("watching {} for changes", self.root.display());
        Ok(())
    }

    /// Graceful stop: flush the watcher, cancel any in-flight batch at the
    /// next phase boundary, and wait for the worker to finish. The worker
    /// releases the workspace on exit; partial writes are safe because every
    /// batch is idempotent with respect to its input set.
    pub async fn stop(&mut self) {
        self.state.store(ServiceState::Stopping.as_u8(), Ordering::SeqCst);
        self.cancel.cancel();
        self.watcher.stop();
        if let Some(worker) = self.worker.take() {
            let _ = worker.await;
        }
        self.state.store(ServiceState::Stopped.as_u8(), Ordering::SeqCst);
        info!("update service stopped");
    }

    pub fn is_watching(&self) -> bool {
        self.watcher.is_watching()
    }
}

struct UpdateWorker {
    state: UpdateState,
    repo: Arc<GraphRepository>,
    options: UpdateOptions,
    root: PathBuf,
    service_state: Arc<AtomicU8>,
    cancel: CancelFlag,
    events_tx: broadcast::Sender<UpdateCompleted>,
}

impl UpdateWorker {
    async fn run(mut self, mut batch_rx: mpsc::UnboundedReceiver<Vec<FileChange>>) {
        // batches arrive in wall-clock order and are processed one at a time
        while let Some(batch) = batch_rx.recv().await {
            if self.cancel.is_cancelled() {
                break;
            }
            self.service_state
                .store(ServiceState::Updating.as_u8(), Ordering::SeqCst);
            let mut processor = BatchProcessor {
                state: &mut self.state,
                repo: &self.repo,
                options: &self.options,
                root: &self.root,
                cancel: &self.cancel,
            };
            match processor.process(&batch) {
                Ok(event) => {
                    debug!(
                        "batch done: {} files, +{}/-{} nodes, +{}/-{} edges in {}ms",
                        event.updated_files.len(),
                        event.nodes_added,
                        event.nodes_removed,
                        event.edges_added,
                        event.edges_removed,
                        event.duration_ms
                    );
                    let _ = self.events_tx.send(event);
                }
                Err(sharpitect_core::SharpitectError::Cancelled) => break,
                Err(e) => warn!("batch failed: {e}"),
            }
            if self.cancel.is_cancelled() {
                break;
            }
            self.service_state
                .store(ServiceState::Watching.as_u8(), Ordering::SeqCst);
        }
    }
}

struct BatchProcessor<'a> {
    state: &'a mut UpdateState,
    repo: &'a GraphRepository,
    options: &'a UpdateOptions,
    root: &'a Path,
    cancel: &'a CancelFlag,
}

impl BatchProcessor<'_> {
    fn process(&mut self, batch: &[FileChange]) -> Result<UpdateCompleted> {
        let started = Instant::now();
        let mut nodes_added = 0usize;
        let mut nodes_removed = 0usize;
        let mut edges_added = 0usize;
        let mut edges_removed = 0usize;
        let mut changed_ids: HashSet<String> = HashSet::new();
        let mut removed_ids: HashSet<String> = HashSet::new();

        let batch_paths: HashSet<PathBuf> = batch.iter().map(|c| c.path.clone()).collect();

        // delete phase: drop prior data for every touched file
        for change in batch {
            self.cancel.check()?;
            let (n, e, old) = self.delete_file_data(&change.path, true)?;
            nodes_removed += n;
            edges_removed += e;
            removed_ids.extend(old);
            if change.kind == ChangeKind::Deleted {
                self.state.workspace.remove_document(&change.path);
            }
        }

        // analyse phase: re-extract non-deleted files
        for change in batch {
            self.cancel.check()?;
            if change.kind == ChangeKind::Deleted {
                continue;
            }
            let (n, e, new) = self.analyze_and_insert(&change.path)?;
            nodes_added += n;
            edges_added += e;
            changed_ids.extend(new);
        }

        // cascade phase: one round over dependents, no recursion
        if self.options.cascade {
            self.cancel.check()?;
            let mut affected: HashSet<PathBuf> = HashSet::new();
            for id in changed_ids.iter().chain(removed_ids.iter()) {
                for file in self.state.deps.files_for_node(id) {
                    let absolute = self.root.join(&file);
                    if !batch_paths.contains(&absolute) {
                        affected.insert(absolute);
                    }
                }
            }
            for path in affected {
                self.cancel.check()?;
                debug!("cascade re-analysis of {}", path.display());
                // prior tracker entries survive the cascade so re-created
                // nodes can still find their dependents later
                let (n, e, _) = self.delete_file_data(&path, false)?;
                nodes_removed += n;
                edges_removed += e;
                let (n, e, _) = self.analyze_and_insert(&path)?;
                nodes_added += n;
                edges_added += e;
            }
        }

        let updated_files: Vec<String> = batch
            .iter()
            .map(|c| paths::to_workspace_relative(self.root, &c.path))
            .collect();
        Ok(UpdateCompleted {
            updated_files,
            nodes_added,
            nodes_removed,
            edges_added,
            edges_removed,
            duration_ms: started.elapsed().as_millis(),
        })
    }

    /// Remove a file's nodes and produced edges from the repository, the
    /// in-memory graph, the symbol map, and (optionally) the tracker.
    fn delete_file_data(
        &mut self,
        path: &Path,
        purge_tracker: bool,
    ) -> Result<(usize, usize, HashSet<String>)> {
        let relative = paths::to_workspace_relative(self.root, path);

        let mut old_ids: HashSet<String> = self.state.graph.nodes_for_file(&relative).into_iter().collect();
        // a namespace still containing declarations from other files
        // outlives this file's deletion
        let shared_namespaces: Vec<String> = old_ids
            .iter()
            .filter(|id| {
                self.state
                    .graph
                    .node(id)
                    .is_some_and(|n| n.kind == NodeKind::Namespace)
            })
            .filter(|id| {
                self.state.graph.edges_from(id).iter().any(|e| {
                    e.kind == EdgeKind::Contains && !old_ids.contains(&e.target_id)
                })
            })
            .cloned()
            .collect();
        for id in shared_namespaces {
            old_ids.remove(&id);
        }
        let old_edges = self.state.graph.edges_for_source_file(&relative);

        let edges_removed = self.repo.delete_edges_by_source_file(&relative)?;
        let id_list: Vec<String> = old_ids.iter().cloned().collect();
        let nodes_removed = self.repo.delete_nodes(&id_list)?;

        for edge_id in &old_edges {
            self.state.graph.remove_edge(edge_id);
        }
        for id in &old_ids {
            self.state.graph.remove_node(id);
            self.state.known_ids.remove(id);
        }
        self.state.symbol_map.remove_node_ids(&old_ids);
        if purge_tracker {
            self.state.deps.remove_references_from_file(Path::new(&relative));
        }

        Ok((nodes_removed, edges_removed, old_ids))
    }

    /// Re-run the three passes on one document and insert the results
    /// everywhere. Best-effort: a file that fails to analyse contributes
    /// nothing until the next successful update.
    fn analyze_and_insert(&mut self, path: &Path) -> Result<(usize, usize, HashSet<String>)> {
        let analyzer_options = AnalyzerOptions {
            visit_locals: self.options.visit_locals,
        };
        let result = analyze_file(
            &mut self.state.workspace,
            path,
            &mut self.state.symbol_map,
            &mut self.state.known_ids,
            &analyzer_options,
        )?;

        let new_ids: HashSet<String> = result.nodes.iter().map(|n| n.id.clone()).collect();

        // keep synthetic roots intact when a namespace shares their id
        let nodes_to_insert: Vec<_> = result
            .nodes
            .iter()
            .filter(|n| {
                !(n.kind == NodeKind::Namespace
                    && self.state.graph.node(&n.id).is_some_and(|existing| {
                        matches!(existing.kind, NodeKind::Solution | NodeKind::Project)
                    }))
            })
            .cloned()
            .collect();
        self.repo.upsert_nodes(&nodes_to_insert)?;
        for node in &nodes_to_insert {
            self.state.graph.upsert_node(node.clone());
        }

        let valid_edges: Vec<_> = result
            .edges
            .into_iter()
            .filter(|e| {
                self.state.known_ids.contains(&e.source_id) && self.state.known_ids.contains(&e.target_id)
            })
            .collect();
        self.repo.upsert_edges(&valid_edges)?;
        let mut edges_inserted = valid_edges.len();
        for edge in &valid_edges {
            self.state.graph.add_edge(edge.clone());
            if edge.kind != EdgeKind::Contains {
                if let Some(file) = &edge.source_file_path {
                    self.state.deps.record_reference(Path::new(file), &edge.target_id);
                }
            }
        }

        // a namespace that first appears during watch mode still hangs off
        // its project
        let project = self
            .state
            .workspace
            .project_for_path(path)
            .map(|p| p.name.clone());
        if let Some(project) = project.filter(|p| self.state.known_ids.contains(p)) {
            for node in result.nodes.iter().filter(|n| n.kind == NodeKind::Namespace) {
                if !self.state.graph.parents_of(&node.id).is_empty() {
                    continue;
                }
                let edge = RelationshipEdge {
                    id: uuid::Uuid::new_v4().to_string(),
                    source_id: project.clone(),
                    target_id: node.id.clone(),
                    kind: EdgeKind::Contains,
                    source_file_path: None,
                    source_line: None,
                    metadata: None,
                };
                self.repo.upsert_edge(&edge)?;
                self.state.graph.add_edge(edge);
                edges_inserted += 1;
            }
        }

        Ok((new_ids.len(), edges_inserted, new_ids))
    }
}
