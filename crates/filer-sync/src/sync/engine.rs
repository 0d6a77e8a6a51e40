//! The sync engine: one loop per pane that owns a view and keeps it current.
//!
//! Inputs come from three places: the directory watcher, a streaming population, and the
//! reconciliation timer (plus the background listing it starts). [`SyncEngine::next_step`]
//! waits on all of them and applies exactly one input before returning, so every view mutation
//! happens on the caller's task with no `.await` in the middle. That is also what serializes
//! live events against reconciliation: a pass whose listing was taken before a newer event
//! got applied is thrown away and rescheduled instead of being merged.

use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::file_system::listing::view::VIEW_CHANGE_CAPACITY;
use crate::file_system::listing::{
    DirectoryStream, EntryMetadata, Population, SortDirection, SortKey, SortedEntryView, ViewChange, list_directory,
    spawn_population,
};
use crate::file_system::watcher::{ChangeWatcher, FsChange};
use crate::sync::reconciler::{ReconcileReport, apply_listing, fall_back};

/// Whether a streaming population is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LoadingState {
    Idle,
    Populating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    /// Enumerate everything, then reset the view once.
    Full,
    /// Reset to empty and fill in batches as `next_step` pulls them.
    Streaming,
}

/// Outcome of attaching the watcher to a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchStatus {
    Live,
    /// No live updates; the view only changes on refresh or reconciliation.
    Unavailable(String),
}

/// What a single `next_step` call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineStep {
    /// A watcher event. `applied` is false when it fell outside the tracked directory.
    Change { change: FsChange, applied: bool },
    Batch { inserted: usize, loaded: usize },
    PopulationFinished { loaded: usize },
    ReconcileStarted,
    Reconciled(ReconcileReport),
    /// The listing finished after a newer change was applied; a new pass is scheduled.
    StaleReconcileDiscarded,
    /// The watcher stopped delivering events.
    WatchLost,
}

struct InflightReconcile {
    listing: JoinHandle<Result<Vec<EntryMetadata>, SyncError>>,
    /// Set when a change was applied after the listing started.
    superseded: bool,
}

enum Input {
    Change(Option<FsChange>),
    Batch(Option<Vec<EntryMetadata>>),
    ReconcileDue,
    ReconcileDone(Result<Vec<EntryMetadata>, SyncError>),
}

/// Owns one directory's view, watcher and reconciliation schedule.
pub struct SyncEngine {
    config: SyncConfig,
    view: SortedEntryView,
    notifier: broadcast::Sender<ViewChange>,
    watcher: ChangeWatcher,
    loading: watch::Sender<LoadingState>,
    population: Option<Population>,
    /// Changes applied since the current population started
    touched_while_populating: bool,
    reconcile_at: Option<Instant>,
    inflight: Option<InflightReconcile>,
}

impl SyncEngine {
    /// Creates an engine for `directory` with an empty view.
    ///
    /// Fails if the directory can't be resolved. A watcher that can't start is only logged; call
    /// [`set_watched_directory`](Self::set_watched_directory) to get the status explicitly.
    pub fn new(directory: &Path, config: &SyncConfig) -> Result<Self, SyncError> {
        let directory = canonical_directory(directory)?;
        let (notifier, _) = broadcast::channel(VIEW_CHANGE_CAPACITY);
        let (loading, _) = watch::channel(LoadingState::Idle);
        let view = SortedEntryView::new(&directory, config.sort_key, config.sort_direction, notifier.clone());

        let mut engine = Self {
            config: config.clone(),
            view,
            notifier,
            watcher: ChangeWatcher::new(config.watcher_debounce()),
            loading,
            population: None,
            touched_while_populating: false,
            reconcile_at: None,
            inflight: None,
        };
        engine.start_watch();
        Ok(engine)
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    /// Switches to another directory.
    ///
    /// The old population, pending reconciliation and watch are torn down before the new
    /// (empty) view is installed, so nothing from the old directory reaches it.
    pub fn set_watched_directory(&mut self, path: &Path) -> Result<WatchStatus, SyncError> {
        let directory = canonical_directory(path)?;
        self.cancel_population();
        self.cancel_reconcile();
        self.watcher.stop();

        let (key, direction) = self.view.sort();
        self.view = SortedEntryView::new(&directory, key, direction, self.notifier.clone());
        log::info!("Now tracking {}", directory.display());
        Ok(self.start_watch())
    }

    /// Moves to the parent directory. `Ok(None)` at the filesystem root.
    pub fn navigate_up(&mut self) -> Result<Option<WatchStatus>, SyncError> {
        let Some(parent) = self.view.directory().parent().map(Path::to_path_buf) else {
            return Ok(None);
        };
        self.set_watched_directory(&parent).map(Some)
    }

    fn start_watch(&mut self) -> WatchStatus {
        if !self.config.live_updates {
            return WatchStatus::Unavailable("live updates are disabled".to_string());
        }
        match self.watcher.watch(self.view.directory()) {
            Ok(()) => WatchStatus::Live,
            Err(e) => {
                log::warn!("Live updates unavailable, continuing without: {}", e);
                WatchStatus::Unavailable(e.to_string())
            }
        }
    }

    // ========================================================================
    // Refresh
    // ========================================================================

    /// Repopulates the view from disk. A newer refresh supersedes a running population.
    pub async fn refresh(&mut self, mode: RefreshMode) -> Result<(), SyncError> {
        self.cancel_population();
        self.cancel_reconcile();
        let directory = self.view.directory().to_path_buf();

        match mode {
            RefreshMode::Full => {
                let entries = tokio::task::spawn_blocking(move || list_directory(&directory)).await??;
                self.view.reset(entries);
                log::info!("Loaded {}: {}", self.view.directory().display(), self.view.counts());
            }
            RefreshMode::Streaming => {
                let stream = DirectoryStream::open(&directory, self.config.effective_batch_size())?;
                self.view.reset(Vec::new());
                self.population = Some(spawn_population(stream));
                self.touched_while_populating = false;
                self.set_loading(LoadingState::Populating);
            }
        }
        Ok(())
    }

    fn cancel_population(&mut self) {
        if let Some(population) = self.population.take() {
            population.cancel();
            log::debug!("Cancelled population after {} entries", population.loaded());
        }
        self.touched_while_populating = false;
        self.set_loading(LoadingState::Idle);
    }

    fn finish_population(&mut self) -> EngineStep {
        let loaded = self.population.take().map(|p| p.loaded()).unwrap_or(0);
        self.set_loading(LoadingState::Idle);
        log::info!("Loaded {}: {}", self.view.directory().display(), self.view.counts());
        if std::mem::take(&mut self.touched_while_populating) {
            self.arm_reconcile();
        }
        EngineStep::PopulationFinished { loaded }
    }

    fn set_loading(&self, state: LoadingState) {
        let changed = self.loading.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        });
        if changed {
            log::debug!("Loading state of {}: {:?}", self.view.directory().display(), state);
        }
    }

    // ========================================================================
    // Event loop
    // ========================================================================

    /// Waits for the next input and applies it.
    ///
    /// Returns `None` once nothing can arrive any more: no watch, no population, no
    /// reconciliation pending. Cancel-safe: dropping the future before it resolves loses nothing.
    pub async fn next_step(&mut self) -> Option<EngineStep> {
        let watching = self.watcher.has_subscription();
        let populating = self.population.is_some();
        let reconciling = self.inflight.is_some();
        // The timer waits out populations and in-flight passes
        let due = self.reconcile_at.filter(|_| !populating && !reconciling);

        let input = tokio::select! {
            biased;
            change = self.watcher.recv(), if watching => Input::Change(change),
            batch = next_population_batch(&mut self.population), if populating => Input::Batch(batch),
            result = join_listing(&mut self.inflight), if reconciling => Input::ReconcileDone(result),
            () = sleep_until_due(due), if due.is_some() => Input::ReconcileDue,
            else => return None,
        };

        let step = match input {
            Input::Change(Some(change)) => {
                let applied = self.handle_change(change.clone());
                EngineStep::Change { change, applied }
            }
            Input::Change(None) => {
                self.watcher.discard_dead();
                EngineStep::WatchLost
            }
            Input::Batch(Some(batch)) => {
                let inserted = self.view.insert_batch(batch);
                let loaded = self.population.as_ref().map(Population::loaded).unwrap_or(0);
                EngineStep::Batch { inserted, loaded }
            }
            Input::Batch(None) => self.finish_population(),
            Input::ReconcileDue => {
                self.start_reconcile();
                EngineStep::ReconcileStarted
            }
            Input::ReconcileDone(result) => self.finish_reconcile(result),
        };
        Some(step)
    }

    /// Applies one watcher change to the view. Returns false if it was outside the tracked directory.
    ///
    /// Paths may go through a symlinked spelling of the directory; they are mapped onto the
    /// canonical directory before touching the view. Every applied change re-arms the
    /// reconciliation timer.
    pub fn handle_change(&mut self, change: FsChange) -> bool {
        let applied = match &change {
            FsChange::Rescan => {
                log::info!("Events were lost for {}, scheduling a rescan", self.view.directory().display());
                true
            }
            FsChange::Added(path) => match self.scoped(path) {
                Some(path) => {
                    self.view.insert_sorted(EntryMetadata::resolve(&path));
                    true
                }
                None => false,
            },
            FsChange::Removed(path) if self.is_tracked_root(path) => {
                log::info!("Tracked directory removed: {}", path.display());
                true
            }
            FsChange::Removed(path) => match self.scoped(path) {
                Some(path) => {
                    self.view.remove_by_path(&path);
                    true
                }
                None => false,
            },
            FsChange::Modified(path) => match self.scoped(path) {
                Some(path) => {
                    self.view.update_by_path(&path);
                    true
                }
                None => false,
            },
            FsChange::Moved { from, .. } if self.is_tracked_root(from) => {
                log::info!("Tracked directory moved away: {}", from.display());
                true
            }
            FsChange::Moved { from, to } => match (self.scoped(from), self.scoped(to)) {
                (Some(from), Some(to)) => {
                    self.view.rename(&from, &to);
                    true
                }
                (Some(from), None) => {
                    self.view.remove_by_path(&from);
                    true
                }
                (None, Some(to)) => {
                    self.view.insert_sorted(EntryMetadata::resolve(&to));
                    true
                }
                (None, None) => false,
            },
        };

        if applied {
            self.arm_reconcile();
        } else {
            log::debug!("Ignoring change outside {}: {:?}", self.view.directory().display(), change);
        }
        applied
    }

    /// `path` rewritten under the canonical tracked directory, if it is a direct child of it.
    fn scoped(&self, path: &Path) -> Option<PathBuf> {
        let directory = self.view.directory();
        let parent = path.parent()?;
        let name = path.file_name()?;
        if parent == directory {
            return Some(path.to_path_buf());
        }
        // The parent still exists when only the entry itself is gone
        match parent.canonicalize() {
            Ok(canonical) if canonical == directory => Some(directory.join(name)),
            _ => None,
        }
    }

    fn is_tracked_root(&self, path: &Path) -> bool {
        let directory = self.view.directory();
        if path == directory {
            return true;
        }
        path.parent() != Some(directory) && path.canonicalize().is_ok_and(|p| p == directory)
    }

    // ========================================================================
    // Reconciliation
    // ========================================================================

    /// Restarts the quiescence window.
    fn arm_reconcile(&mut self) {
        self.reconcile_at = Some(Instant::now() + self.config.reconcile_quiescence());
        if self.population.is_some() {
            self.touched_while_populating = true;
        }
        if let Some(inflight) = self.inflight.as_mut() {
            inflight.superseded = true;
        }
    }

    fn cancel_reconcile(&mut self) {
        self.reconcile_at = None;
        if let Some(inflight) = self.inflight.take() {
            // The blocking listing can't be interrupted; its result is just never read
            inflight.listing.abort();
        }
    }

    fn start_reconcile(&mut self) {
        self.reconcile_at = None;
        let directory = self.view.directory().to_path_buf();
        log::debug!("Reconciling {}", directory.display());
        self.inflight = Some(InflightReconcile {
            listing: tokio::task::spawn_blocking(move || list_directory(&directory)),
            superseded: false,
        });
    }

    fn finish_reconcile(&mut self, listing: Result<Vec<EntryMetadata>, SyncError>) -> EngineStep {
        let superseded = self.inflight.take().is_some_and(|inflight| inflight.superseded);
        if superseded {
            log::debug!("Discarding reconciliation of {}: changed meanwhile", self.view.directory().display());
            if self.reconcile_at.is_none() {
                self.arm_reconcile();
            }
            return EngineStep::StaleReconcileDiscarded;
        }

        let report = match listing {
            Ok(entries) => apply_listing(&mut self.view, entries),
            Err(e) => fall_back(&mut self.view, &e),
        };
        if report.changed() {
            log::info!("Reconciled {}: {:?}", self.view.directory().display(), report);
        }
        EngineStep::Reconciled(report)
    }

    /// Runs a reconciliation pass right away, replacing any scheduled one.
    pub async fn reconcile_now(&mut self) -> ReconcileReport {
        self.cancel_reconcile();
        let directory = self.view.directory().to_path_buf();
        let listing = match tokio::task::spawn_blocking(move || list_directory(&directory)).await {
            Ok(listing) => listing,
            Err(e) => Err(e.into()),
        };
        match listing {
            Ok(entries) => apply_listing(&mut self.view, entries),
            Err(e) => fall_back(&mut self.view, &e),
        }
    }

    /// Time left before the scheduled pass, if one is armed.
    pub fn reconcile_due_in(&self) -> Option<std::time::Duration> {
        self.reconcile_at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn view(&self) -> &SortedEntryView {
        &self.view
    }

    pub fn directory(&self) -> &Path {
        self.view.directory()
    }

    pub fn sort(&self) -> (SortKey, SortDirection) {
        self.view.sort()
    }

    pub fn set_sort(&mut self, key: SortKey, direction: SortDirection) {
        self.view.change_sort(key, direction);
    }

    pub fn is_watching(&self) -> bool {
        self.watcher.is_watching()
    }

    pub fn is_populating(&self) -> bool {
        self.population.is_some()
    }

    /// View changes, across directory switches.
    pub fn subscribe(&self) -> broadcast::Receiver<ViewChange> {
        self.notifier.subscribe()
    }

    pub fn loading_state(&self) -> watch::Receiver<LoadingState> {
        self.loading.subscribe()
    }
}

fn canonical_directory(path: &Path) -> Result<PathBuf, SyncError> {
    let canonical = path
        .canonicalize()
        .map_err(|e| SyncError::directory_access(path, e))?;
    if !canonical.is_dir() {
        let err = std::io::Error::new(std::io::ErrorKind::NotADirectory, "not a directory");
        return Err(SyncError::directory_access(path, err));
    }
    Ok(canonical)
}

async fn next_population_batch(population: &mut Option<Population>) -> Option<Vec<EntryMetadata>> {
    match population {
        Some(population) => population.next_batch().await,
        None => std::future::pending().await,
    }
}

async fn join_listing(inflight: &mut Option<InflightReconcile>) -> Result<Vec<EntryMetadata>, SyncError> {
    match inflight {
        Some(inflight) => match (&mut inflight.listing).await {
            Ok(listing) => listing,
            Err(e) => Err(e.into()),
        },
        None => std::future::pending().await,
    }
}

async fn sleep_until_due(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
