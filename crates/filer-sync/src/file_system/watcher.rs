//! Directory watcher: notify events normalized into four semantic changes.
//!
//! One subscription at a time. Events flow from the debouncer thread through an unbounded
//! channel that belongs to the subscription, so tearing a subscription down also drops every
//! event it had queued. Nothing from an old directory can reach the next one.

use notify_debouncer_full::{
    DebounceEventResult, Debouncer, RecommendedCache, new_debouncer,
    notify::{
        Event, EventKind, RecommendedWatcher, RecursiveMode,
        event::{ModifyKind, RenameMode},
    },
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

/// A normalized filesystem change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsChange {
    Added(PathBuf),
    Removed(PathBuf),
    /// Content or metadata of a non-directory entry changed.
    Modified(PathBuf),
    Moved { from: PathBuf, to: PathBuf },
    /// Events were lost (queue overflow, watcher error). Only a full listing can tell what changed.
    Rescan,
}

/// Errors that can occur when starting a watch.
#[derive(Debug)]
pub enum WatchError {
    /// Path is missing or not a directory.
    NotADirectory(PathBuf),
    /// The OS watcher couldn't be created or attached.
    Start { path: PathBuf, message: String },
}

impl WatchError {
    fn start(path: &Path, err: impl std::fmt::Display) -> Self {
        Self::Start {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }
}

impl std::fmt::Display for WatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotADirectory(path) => write!(f, "Not a directory: {}", path.display()),
            Self::Start { path, message } => write!(f, "Failed to watch {}: {}", path.display(), message),
        }
    }
}

impl std::error::Error for WatchError {}

/// State for the active watch.
struct Subscription {
    path: PathBuf,
    /// Cleared when the OS watcher reports the root gone or fails.
    alive: Arc<AtomicBool>,
    debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
    events: mpsc::UnboundedReceiver<FsChange>,
}

/// Watches one directory (non-recursive) and yields [`FsChange`]s.
pub struct ChangeWatcher {
    debounce: Duration,
    subscription: Option<Subscription>,
}

impl ChangeWatcher {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            subscription: None,
        }
    }

    /// Starts watching `path`, stopping the previous watch first.
    ///
    /// When this returns, the old watch is fully torn down: its debouncer thread has
    /// finished and its queued events are gone.
    pub fn watch(&mut self, path: &Path) -> Result<(), WatchError> {
        self.stop();

        if !path.is_dir() {
            log::warn!("Cannot watch non-existent or non-directory path: {}", path.display());
            return Err(WatchError::NotADirectory(path.to_path_buf()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let alive = Arc::new(AtomicBool::new(true));
        let root = path.to_path_buf();
        let alive_for_callback = Arc::clone(&alive);

        let mut debouncer = new_debouncer(self.debounce, None, move |result: DebounceEventResult| {
            forward_events(&root, result, &tx, &alive_for_callback);
        })
        .map_err(|e| WatchError::start(path, e))?;

        debouncer
            .watch(path, RecursiveMode::NonRecursive)
            .map_err(|e| WatchError::start(path, e))?;

        log::info!("Started watching directory: {}", path.display());
        self.subscription = Some(Subscription {
            path: path.to_path_buf(),
            alive,
            debouncer,
            events: rx,
        });
        Ok(())
    }

    /// Stops the current watch. Safe to call when not watching.
    pub fn stop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            // Blocks until the debouncer thread exits
            subscription.debouncer.stop();
            log::info!("Stopped watching directory: {}", subscription.path.display());
        }
    }

    /// True only while the OS watcher is attached and healthy.
    pub fn is_watching(&self) -> bool {
        self.subscription
            .as_ref()
            .is_some_and(|s| s.alive.load(Ordering::Relaxed))
    }

    pub fn watched_path(&self) -> Option<&Path> {
        self.subscription.as_ref().map(|s| s.path.as_path())
    }

    pub(crate) fn has_subscription(&self) -> bool {
        self.subscription.is_some()
    }

    /// Waits for the next change. Pends forever when not watching.
    /// `None` means the debouncer went away on its own; the watch is dead.
    pub async fn recv(&mut self) -> Option<FsChange> {
        match self.subscription.as_mut() {
            Some(subscription) => subscription.events.recv().await,
            None => std::future::pending().await,
        }
    }

    /// Drops a subscription whose event source has closed.
    pub(crate) fn discard_dead(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            log::warn!("Watcher for {} stopped delivering events", subscription.path.display());
            subscription.alive.store(false, Ordering::Relaxed);
        }
    }
}

impl Drop for ChangeWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Runs on the debouncer thread.
fn forward_events(
    root: &Path,
    result: DebounceEventResult,
    tx: &mpsc::UnboundedSender<FsChange>,
    alive: &AtomicBool,
) {
    match result {
        Ok(events) => {
            for event in events {
                for change in normalize(root, &event, probe_path) {
                    let root_gone = match &change {
                        FsChange::Removed(path) => path == root,
                        FsChange::Moved { from, .. } => from == root,
                        _ => false,
                    };
                    if root_gone {
                        log::info!("Watched directory went away: {}", root.display());
                        alive.store(false, Ordering::Relaxed);
                    }
                    log::debug!("Watcher: {:?}", change);
                    if tx.send(change).is_err() {
                        // Subscription torn down
                        return;
                    }
                }
            }
        }
        Err(errors) => {
            for e in errors {
                log::warn!("Watcher error on {}: {}", root.display(), e);
            }
            if !root.is_dir() {
                alive.store(false, Ordering::Relaxed);
            }
            let _ = tx.send(FsChange::Rescan);
        }
    }
}

/// `Some(is_dir)` if the path exists, `None` if it doesn't.
fn probe_path(path: &Path) -> Option<bool> {
    std::fs::metadata(path).ok().map(|m| m.is_dir())
}

/// Maps one notify event to normalized changes.
///
/// An event flagged for rescan becomes a single [`FsChange::Rescan`], whatever its kind.
/// `probe` reports whether a path exists and whether it is a directory. It's only consulted for
/// modifications (directory modifications are dropped; child events supersede them) and for
/// renames that don't say which side they are.
pub fn normalize(root: &Path, event: &Event, probe: impl Fn(&Path) -> Option<bool>) -> Vec<FsChange> {
    if event.need_rescan() {
        return vec![FsChange::Rescan];
    }
    let paths = &event.paths;
    match event.kind {
        EventKind::Create(_) => paths
            .iter()
            .filter(|p| p.as_path() != root)
            .map(|p| FsChange::Added(p.clone()))
            .collect(),
        EventKind::Remove(_) => paths.iter().map(|p| FsChange::Removed(p.clone())).collect(),
        EventKind::Modify(ModifyKind::Name(mode)) => normalize_rename(mode, paths, &probe),
        EventKind::Modify(_) => paths
            .iter()
            .filter(|p| p.as_path() != root && probe(p) != Some(true))
            .map(|p| FsChange::Modified(p.clone()))
            .collect(),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}

fn normalize_rename(mode: RenameMode, paths: &[PathBuf], probe: &impl Fn(&Path) -> Option<bool>) -> Vec<FsChange> {
    match (mode, paths) {
        (RenameMode::From, [from, ..]) => vec![FsChange::Removed(from.clone())],
        (RenameMode::To, [to, ..]) => vec![FsChange::Added(to.clone())],
        (_, [from, to, ..]) => vec![FsChange::Moved {
            from: from.clone(),
            to: to.clone(),
        }],
        // One path, direction unknown (FSEvents): the disk decides which side this is
        (_, [path]) => {
            if probe(path).is_some() {
                vec![FsChange::Added(path.clone())]
            } else {
                vec![FsChange::Removed(path.clone())]
            }
        }
        (_, []) => Vec::new(),
    }
}
