//! Live, sorted view of one directory that stays in sync with the filesystem.
//!
//! The pieces, leaves first:
//! - [`EntryMetadata`]: a resolved snapshot of one directory child.
//! - [`DirectoryStream`] / [`list_directory`]: unsorted enumeration, full or in batches.
//! - [`SortedEntryView`]: the ordered collection with granular change notifications.
//! - [`ChangeWatcher`]: notify-based watcher, normalized to [`FsChange`].
//! - [`SyncEngine`]: the single loop that applies changes and drives reconciliation.

// Warn on unused dependencies to catch cfg mismatches between the lib and the binary
#![warn(unused_crate_dependencies)]
// Warn on redundant path prefixes (e.g., std::path::Path when Path is imported)
#![warn(unused_qualifications)]
// Use log::* macros instead of println!/eprintln! for proper log level control
#![deny(clippy::print_stdout, clippy::print_stderr)]

//noinspection RsUnusedImport
// Only the filer-watch binary uses these
use dirs as _;
//noinspection RsUnusedImport
use env_logger as _;

pub mod config;
pub mod error;
pub mod file_system;
pub mod sync;

pub use config::{SyncConfig, load_config};
pub use error::SyncError;
pub use file_system::listing::{
    DirectoryStream, EntryCounts, EntryMetadata, InsertOutcome, Population, RemoveOutcome, RenameOutcome,
    SortDirection, SortKey, SortedEntryView, UpdateOutcome, ViewChange, list_directory, spawn_population,
};
pub use file_system::watcher::{ChangeWatcher, FsChange, WatchError};
pub use sync::engine::{EngineStep, LoadingState, RefreshMode, SyncEngine, WatchStatus};
pub use sync::reconciler::{ReconcileReport, ReconciliationPass, reconcile};
