//! Debounced, coalescing filesystem watcher scoped to one extension

use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use sharpitect_core::{paths, Result, SharpitectError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// The coalesced change kind delivered for a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
    Renamed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

/// Watches one directory tree for changes to files with a single extension,
/// delivering coalesced batches at most once per debounce interval.
///
/// Within a window, repeated events for the same path collapse to one
/// change: a deletion absorbs earlier events, a re-creation after deletion
/// survives as the latest kind, and `Modified` wins over `Created`. Renames
/// enter the window as `Deleted(old) + Created(new)`. Paths under `bin/` or
/// `obj/` are ignored.
pub struct FileChangeWatcher {
    extension: String,
    debounce: Duration,
    root: Option<PathBuf>,
    watcher: Option<RecommendedWatcher>,
    is_watching: bool,
}

impl FileChangeWatcher {
    pub fn new(extension: impl Into<String>, debounce: Duration) -> Self {
        FileChangeWatcher {
            extension: extension.into(),
            debounce,
            root: None,
            watcher: None,
            is_watching: false,
        }
    }

    /// Watcher for `.cs` sources with the default interval.
    pub fn for_csharp() -> Self {
        Self::new("cs", DEFAULT_DEBOUNCE)
    }

    pub fn is_watching(&self) -> bool {
        self.is_watching
    }

    /// Begin watching `root` recursively. Returns the batch channel; one
    /// `Vec<FileChange>` arrives per quiescent debounce window.
    pub fn start(&mut self, root: &Path) -> Result<mpsc::UnboundedReceiver<Vec<FileChange>>> {
        let root = root.to_path_buf();
        let (raw_tx, raw_rx) = mpsc::unbounded_channel::<FileChange>();
        let (batch_tx, batch_rx) = mpsc::unbounded_channel::<Vec<FileChange>>();

        let extension = self.extension.clone();
        let filter_root = root.clone();
        let mut watcher = notify::recommended_watcher(
            move |result: std::result::Result<notify::Event, notify::Error>| {
                let event = match result {
                    Ok(event) => event,
                    Err(e) => {
                        error!("filesystem watch error: {e}");
                        return;
                    }
                };
                for change in raw_changes(&event) {
                    if !is_relevant(&filter_root, &change.path, &extension) {
                        continue;
                    }
                    // the handler must not block; enqueue and return
                    if raw_tx.send(change).is_err() {
                        warn!("change dropped, debouncer is gone");
                    }
                }
            },
        )
        .map_err(|e| SharpitectError::WorkspaceOpen {
            path: root.display().to_string(),
            reason: format!("watcher failed: {e}"),
        })?;

        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e| SharpitectError::WorkspaceOpen {
                path: root.display().to_string(),
                reason: format!("watch failed: {e}"),
            })?;

        tokio::spawn(debounce_loop(raw_rx, batch_tx, self.debounce));

        self.root = Some(root);
        self.watcher = Some(watcher);
        self.is_watching = true;
        Ok(batch_rx)
    }

    /// Stop watching. Dropping the notify handle closes the raw channel,
    /// which makes the debouncer flush anything pending and exit.
    pub fn stop(&mut self) {
        self.watcher = None;
        self.is_watching = false;
    }
}

impl Drop for FileChangeWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn debounce_loop(
    mut raw_rx: mpsc::UnboundedReceiver<FileChange>,
    batch_tx: mpsc::UnboundedSender<Vec<FileChange>>,
    debounce: Duration,
) {
    let mut pending: HashMap<PathBuf, ChangeKind> = HashMap::new();
    loop {
        tokio::select! {
            maybe = raw_rx.recv() => match maybe {
                Some(change) => {
                    debug!("raw change: {:?} {}", change.kind, change.path.display());
                    coalesce(&mut pending, change);
                }
                None => {
                    flush(&mut pending, &batch_tx);
                    break;
                }
            },
            // quiescence: nothing new for a full interval
            _ = tokio::time::sleep(debounce), if !pending.is_empty() => {
                flush(&mut pending, &batch_tx);
            }
        }
    }
}

fn coalesce(pending: &mut HashMap<PathBuf, ChangeKind>, change: FileChange) {
    let entry = pending.entry(change.path);
    match entry {
        std::collections::hash_map::Entry::Vacant(slot) => {
            slot.insert(change.kind);
        }
        std::collections::hash_map::Entry::Occupied(mut slot) => {
            let merged = match (*slot.get(), change.kind) {
                // a deletion absorbs everything that came before it
                (_, ChangeKind::Deleted) => ChangeKind::Deleted,
                // re-created after deletion: latest kind wins
                (ChangeKind::Deleted, kind) => kind,
                (ChangeKind::Modified, ChangeKind::Created) => ChangeKind::Modified,
                (ChangeKind::Created, ChangeKind::Modified) => ChangeKind::Modified,
                (_, kind) => kind,
            };
            slot.insert(merged);
        }
    }
}

fn flush(pending: &mut HashMap<PathBuf, ChangeKind>, batch_tx: &mpsc::UnboundedSender<Vec<FileChange>>) {
    if pending.is_empty() {
        return;
    }
    let mut batch: Vec<FileChange> = pending
        .drain()
        .map(|(path, kind)| FileChange { path, kind })
        .collect();
    batch.sort_by(|a, b| a.path.cmp(&b.path));
    debug!("flushing batch of {} changes", batch.len());
    let _ = batch_tx.send(batch);
}

/// Translate a notify event into zero or more raw changes. Rename pairs are
/// split into delete-old plus create-new so the coalescing rules apply
/// uniformly.
fn raw_changes(event: &notify::Event) -> Vec<FileChange> {
    match &event.kind {
        EventKind::Create(_) => event
            .paths
            .iter()
            .map(|p| FileChange {
                path: p.clone(),
                kind: ChangeKind::Created,
            })
            .collect(),
        EventKind::Remove(_) => event
            .paths
            .iter()
            .map(|p| FileChange {
                path: p.clone(),
                kind: ChangeKind::Deleted,
            })
            .collect(),
        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::From => event
                .paths
                .iter()
                .map(|p| FileChange {
                    path: p.clone(),
                    kind: ChangeKind::Deleted,
                })
                .collect(),
            RenameMode::To => event
                .paths
                .iter()
                .map(|p| FileChange {
                    path: p.clone(),
                    kind: ChangeKind::Created,
                })
                .collect(),
            _ => {
                let mut changes = Vec::new();
                if let Some(old) = event.paths.first() {
                    changes.push(FileChange {
                        path: old.clone(),
                        kind: ChangeKind::Deleted,
                    });
                }
                if let Some(new) = event.paths.get(1) {
                    changes.push(FileChange {
                        path: new.clone(),
                        kind: ChangeKind::Created,
                    });
                }
                changes
            }
        },
        EventKind::Modify(_) => event
            .paths
            .iter()
            .map(|p| FileChange {
                path: p.clone(),
                kind: ChangeKind::Modified,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn is_relevant(root: &Path, path: &Path, extension: &str) -> bool {
    if path.extension().and_then(|e| e.to_str()) != Some(extension) {
        return false;
    }
    let relative = path.strip_prefix(root).unwrap_or(path);
    !paths::in_build_output(relative)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn change(path: &str, kind: ChangeKind) -> FileChange {
        FileChange {
            path: PathBuf::from(path),
            kind,
        }
    }

    #[test]
    fn deletion_absorbs_earlier_events() {
        let mut pending = HashMap::new();
        coalesce(&mut pending, change("a.cs", ChangeKind::Created));
        coalesce(&mut pending, change("a.cs", ChangeKind::Modified));
        coalesce(&mut pending, change("a.cs", ChangeKind::Deleted));
        assert_eq!(pending[&PathBuf::from("a.cs")], ChangeKind::Deleted);
    }

    #[test]
    fn modified_wins_over_created() {
        let mut pending = HashMap::new();
        coalesce(&mut pending, change("a.cs", ChangeKind::Created));
        coalesce(&mut pending, change("a.cs", ChangeKind::Modified));
        assert_eq!(pending[&PathBuf::from("a.cs")], ChangeKind::Modified);

        let mut reversed = HashMap::new();
        coalesce(&mut reversed, change("a.cs", ChangeKind::Modified));
        coalesce(&mut reversed, change("a.cs", ChangeKind::Created));
        assert_eq!(reversed[&PathBuf::from("a.cs")], ChangeKind::Modified);
    }

    #[test]
    fn recreation_after_deletion_survives() {
        let mut pending = HashMap::new();
        coalesce(&mut pending, change("a.cs", ChangeKind::Deleted));
        coalesce(&mut pending, change("a.cs", ChangeKind::Created));
        assert_eq!(pending[&PathBuf::from("a.cs")], ChangeKind::Created);
    }

    #[test]
    fn relevance_filter_checks_extension_and_build_dirs() {
        let root = Path::new("/work");
        assert!(is_relevant(root, Path::new("/work/src/A.cs"), "cs"));
        assert!(!is_relevant(root, Path::new("/work/src/A.txt"), "cs"));
        assert!(!is_relevant(root, Path::new("/work/bin/Debug/A.cs"), "cs"));
        assert!(!is_relevant(root, Path::new("/work/proj/obj/A.cs"), "cs"));
    }

    #[tokio::test]
    async fn debouncer_collapses_rapid_writes_into_one_batch() {
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let (batch_tx, mut batch_rx) = mpsc::unbounded_channel();
        tokio::spawn(debounce_loop(raw_rx, batch_tx, Duration::from_millis(50)));

        for _ in 0..3 {
            raw_tx.send(change("f.cs", ChangeKind::Modified)).unwrap();
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let batch = tokio::time::timeout(Duration::from_millis(500), batch_rx.recv())
            .await
            .expect("batch within timeout")
            .expect("channel open");
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].kind, ChangeKind::Modified);
    }

    #[tokio::test]
    async fn dropping_the_raw_sender_flushes_pending() {
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let (batch_tx, mut batch_rx) = mpsc::unbounded_channel();
        tokio::spawn(debounce_loop(raw_rx, batch_tx, Duration::from_secs(60)));

        raw_tx.send(change("f.cs", ChangeKind::Created)).unwrap();
        drop(raw_tx);

        let batch = tokio::time::timeout(Duration::from_millis(500), batch_rx.recv())
            .await
            .expect("flush on close")
            .expect("channel open");
        assert_eq!(batch.len(), 1);
    }

    #[tokio::test]
    async fn watcher_lifecycle_flags() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut watcher = FileChangeWatcher::for_csharp();
        assert!(!watcher.is_watching());
        let _rx = watcher.start(dir.path()).unwrap();
        assert!(watcher.is_watching());
        watcher.stop();
        assert!(!watcher.is_watching());
    }
}
