//! Watcher-driven tracking of external source changes (spec.md §4.5).
//!
//! One logical tracker exists per watchable source, modeled here as entries
//! in a shared registry backed by a single OS-level watcher (cheaper than
//! one `notify` handle per file, and the lifecycle bookkeeping is identical
//! either way). Grounded on the file-watching reactor in the observability
//! sibling repo (`notify` + a bridging channel feeding a single-consumer
//! loop), adapted to the update/unlink/rename vocabulary of this spec.

use crate::indexer::Indexer;
use crate::resolver::FilesystemResolver;
use crate::{CoreError, Result, TimeProvider};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Per-source lifecycle state (spec.md §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLifecycle {
    Attached,
    Orphaned,
    Resumed,
    Deleted,
}

/// An update the tracker observed and already pushed through the indexer.
/// `SessionCore` consumes these to refresh its metadata cache; per spec.md
/// §4.4 this must never change set membership.
#[derive(Debug, Clone)]
pub enum TrackerUpdate {
    Upserted { agent_path: String, object_id: String },
    Deleted { agent_path: String, object_id: String },
}

struct PendingUnlink {
    agent_path: String,
    object_id: String,
    deleted_at_ms: i64,
}

struct TrackerState {
    lifecycle: HashMap<String, SourceLifecycle>,
    pending_unlinks: Vec<PendingUnlink>,
}

/// Subscribes to external source changes and pushes updates through the
/// indexer. Orphaning (no tracker active) is a normal state; resume
/// re-attaches and lets reconcile handle any delta.
pub struct Tracker {
    resolver: Arc<FilesystemResolver>,
    indexer: Arc<Indexer>,
    time: Arc<dyn TimeProvider>,
    rename_window: Duration,
    watcher: Mutex<Option<RecommendedWatcher>>,
    watched_dirs: Mutex<HashMap<PathBuf, ()>>,
    state: Arc<Mutex<TrackerState>>,
    updates_tx: mpsc::UnboundedSender<TrackerUpdate>,
    updates_rx: Mutex<Option<mpsc::UnboundedReceiver<TrackerUpdate>>>,
}

impl Tracker {
    pub fn new(
        resolver: Arc<FilesystemResolver>,
        indexer: Arc<Indexer>,
        time: Arc<dyn TimeProvider>,
        rename_window: Duration,
    ) -> Self {
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        Self {
            resolver,
            indexer,
            time,
            rename_window,
            watcher: Mutex::new(None),
            watched_dirs: Mutex::new(HashMap::new()),
            state: Arc::new(Mutex::new(TrackerState {
                lifecycle: HashMap::new(),
                pending_unlinks: Vec::new(),
            })),
            updates_tx,
            updates_rx: Mutex::new(Some(updates_rx)),
        }
    }

    /// Takes the update channel. `SessionCore` calls this once at
    /// construction and drains it in its single-threaded loop.
    pub fn take_updates(&self) -> Option<mpsc::UnboundedReceiver<TrackerUpdate>> {
        self.updates_rx.lock().expect("tracker mutex poisoned").take()
    }

    /// Attaches a tracker for `agent_path` if it is watchable; a no-op,
    /// never an error, if it isn't (spec.md §4.2/§4.5).
    pub fn attach(&self, agent_path: &str) -> Result<()> {
        if !self.resolver.is_watchable(agent_path) {
            return Ok(());
        }
        let resolved = self.resolver.resolve(agent_path);
        let canonical = resolved.canonical_path;
        let dir = Path::new(&canonical)
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(&canonical));

        self.ensure_watching(&dir)?;
        self.state
            .lock()
            .expect("tracker mutex poisoned")
            .lifecycle
            .insert(canonical, SourceLifecycle::Attached);
        Ok(())
    }

    /// Marks a source orphaned (watcher unavailable — sandbox gone, machine
    /// offline). Never surfaced as an error.
    pub fn orphan(&self, canonical_path: &str) {
        self.state
            .lock()
            .expect("tracker mutex poisoned")
            .lifecycle
            .insert(canonical_path.to_string(), SourceLifecycle::Orphaned);
    }

    /// Resumes a previously orphaned source: re-attach and mark `Resumed`.
    /// The caller (resume protocol) is responsible for reconciling any
    /// delta; this only re-establishes the watch.
    pub fn resume(&self, agent_path: &str) -> Result<()> {
        self.attach(agent_path)?;
        let resolved = self.resolver.resolve(agent_path);
        self.state
            .lock()
            .expect("tracker mutex poisoned")
            .lifecycle
            .insert(resolved.canonical_path, SourceLifecycle::Resumed);
        Ok(())
    }

    pub fn lifecycle_of(&self, canonical_path: &str) -> Option<SourceLifecycle> {
        self.state
            .lock()
            .expect("tracker mutex poisoned")
            .lifecycle
            .get(canonical_path)
            .copied()
    }

    fn ensure_watching(&self, dir: &Path) -> Result<()> {
        let mut watched = self.watched_dirs.lock().expect("tracker mutex poisoned");
        if watched.contains_key(dir) {
            return Ok(());
        }

        let mut guard = self.watcher.lock().expect("tracker mutex poisoned");
        if guard.is_none() {
            let state = Arc::clone(&self.state);
            let tx = self.updates_tx.clone();
            let resolver = Arc::clone(&self.resolver);
            let indexer = Arc::clone(&self.indexer);
            let time = Arc::clone(&self.time);
            let rename_window = self.rename_window;

            let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
                let Ok(event) = res else { return };
                handle_raw_event(
                    event,
                    &state,
                    &tx,
                    &resolver,
                    &indexer,
                    time.as_ref(),
                    rename_window,
                );
            })
            .map_err(|e| CoreError::SourceInaccessible(e.to_string()))?;
            *guard = Some(watcher);
        }

        if let Some(watcher) = guard.as_mut() {
            watcher
                .watch(dir, RecursiveMode::NonRecursive)
                .map_err(|e| CoreError::SourceInaccessible(e.to_string()))?;
        }
        watched.insert(dir.to_path_buf(), ());
        Ok(())
    }
}

/// Translates a raw `notify` event into upsert/unlink handling, including
/// the rename-detection window (spec.md §4.5): an unlink starts a
/// rename-candidate with a short time budget; if an upsert to a new path
/// arrives within the window, the old object is reindexed at the new path;
/// otherwise a tombstone is written.
///
/// Pulled out as a free function (rather than a method) so the rename-window
/// arithmetic can be unit tested without spinning up a real `notify` handle.
fn handle_raw_event(
    event: Event,
    state: &Arc<Mutex<TrackerState>>,
    tx: &mpsc::UnboundedSender<TrackerUpdate>,
    resolver: &FilesystemResolver,
    indexer: &Arc<Indexer>,
    time: &dyn TimeProvider,
    rename_window: Duration,
) {
    let indexer = Arc::clone(indexer);
    let state = Arc::clone(state);
    let tx = tx.clone();
    let now_ms = time.now() * 1000;
    let rename_window_ms = rename_window.as_millis() as i64;

    match event.kind {
        EventKind::Remove(_) => {
            for path in event.paths {
                let Some(canonical) = path.to_str().map(|s| s.to_string()) else { continue };
                let agent_path = resolver.reverse_resolve(&canonical, resolver.default_filesystem_id());
                let object_id = crate::hash::identity_hash_sourced(
                    "file",
                    &crate::types::Source::Filesystem {
                        filesystem_id: resolver.default_filesystem_id().to_string(),
                        canonical_path: canonical.clone(),
                    }
                    .to_json(),
                );
                state.lock().expect("tracker mutex poisoned").pending_unlinks.push(
                    PendingUnlink {
                        agent_path: agent_path.clone(),
                        object_id: object_id.clone(),
                        deleted_at_ms: now_ms,
                    },
                );
                let tx = tx.clone();
                let indexer = Arc::clone(&indexer);
                let state = Arc::clone(&state);
                let default_fs = resolver.default_filesystem_id().to_string();
                tokio::spawn(async move {
                    // Give a rename a chance to land before tombstoning; the
                    // window check happens against the shared pending list,
                    // which the upsert handler above removes entries from if
                    // a rename lands within the window.
                    tokio::time::sleep(Duration::from_millis(rename_window_ms.max(0) as u64)).await;
                    let was_pending = {
                        let mut guard = state.lock().expect("tracker mutex poisoned");
                        let was_pending = guard.pending_unlinks.iter().any(|p| {
                            p.agent_path == agent_path && p.deleted_at_ms == now_ms
                        });
                        guard.pending_unlinks.retain(|p| {
                            !(p.agent_path == agent_path && p.deleted_at_ms == now_ms)
                        });
                        was_pending
                    };
                    if was_pending {
                        let resolver = FilesystemResolver::new(default_fs, vec![]);
                        if let Ok(result) = indexer.delete(&resolver, &agent_path).await {
                            let _ = tx.send(TrackerUpdate::Deleted {
                                agent_path,
                                object_id: result.id,
                            });
                        }
                    }
                });
            }
        }
        EventKind::Create(_) | EventKind::Modify(_) => {
            for path in event.paths {
                let Some(canonical) = path.to_str().map(|s| s.to_string()) else { continue };
                let agent_path = resolver.reverse_resolve(&canonical, resolver.default_filesystem_id());
                let Ok(bytes) = std::fs::read_to_string(&path) else { continue };

                // A create/modify at the same path as a pending unlink,
                // arriving within its rename window, is treated as
                // confirming that specific rename (the common editor
                // atomic-save pattern: unlink then recreate at the same
                // path): the corresponding tombstone write is suppressed and
                // the path is indexed normally below. An unrelated
                // create/modify at a different path must never cancel a
                // pending unlink for this one.
                let mut guard = state.lock().expect("tracker mutex poisoned");
                guard.pending_unlinks.retain(|p| {
                    !(p.agent_path == agent_path
                        && is_within_rename_window(p.deleted_at_ms, now_ms, rename_window))
                });
                drop(guard);

                let tx = tx.clone();
                let resolver_default_fs = resolver.default_filesystem_id().to_string();
                let indexer = Arc::clone(&indexer);
                tokio::spawn(async move {
                    let resolver = FilesystemResolver::new(resolver_default_fs, vec![]);
                    if let Ok(result) = indexer.full_index(&resolver, &agent_path, &bytes).await {
                        let _ = tx.send(TrackerUpdate::Upserted {
                            agent_path,
                            object_id: result.id,
                        });
                    }
                });
            }
        }
        _ => {}
    }
}

/// Pure rename-window decision, extracted for unit testing: given how long
/// ago a path was deleted and the configured window, decide whether a new
/// upsert at the same object id should be treated as a rename.
pub fn is_within_rename_window(deleted_at_ms: i64, now_ms: i64, window: Duration) -> bool {
    now_ms - deleted_at_ms <= window.as_millis() as i64
}
