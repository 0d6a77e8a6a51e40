//! Reconciliation: diff the view against a fresh listing and patch the difference.
//!
//! Incremental updates drift when the OS drops events or reports only half of a rename.
//! A pass compares path sets, plus size and time for entries
//! on both sides, and applies the minimal set of view operations to match the disk.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::error::SyncError;
use crate::file_system::listing::{EntryMetadata, InsertOutcome, RemoveOutcome, SortedEntryView, UpdateOutcome, list_directory};

/// What one reconciliation pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub added: usize,
    pub removed: usize,
    pub updated: usize,
    /// Deferred updates had left the view out of order, so it was re-sorted.
    pub resorted: bool,
    /// The listing failed and the view was emptied.
    pub fell_back: bool,
}

impl ReconcileReport {
    pub fn changed(&self) -> bool {
        self.added > 0 || self.removed > 0 || self.updated > 0 || self.resorted || self.fell_back
    }
}

/// Difference between a view and a disk listing.
#[derive(Debug, Default)]
pub struct ReconciliationPass {
    /// On disk, not in the view
    pub missing: Vec<EntryMetadata>,
    /// In the view, not on disk
    pub extra: Vec<PathBuf>,
    /// In both, but size, time or resolvability differ
    pub stale: Vec<PathBuf>,
}

impl ReconciliationPass {
    /// Compares `view` against a listing of its directory.
    ///
    /// An entry whose kind flipped (file replaced by a directory of the same name) counts as
    /// both extra and missing, since a view entry never changes kind in place.
    pub fn compute(view: &SortedEntryView, disk_entries: Vec<EntryMetadata>) -> Self {
        let in_view: HashMap<&Path, &EntryMetadata> =
            view.entries().iter().map(|e| (e.path.as_path(), e)).collect();
        let mut pass = Self::default();
        let mut seen = Vec::with_capacity(disk_entries.len());

        for disk in disk_entries {
            match in_view.get(disk.path.as_path()) {
                None => {}
                Some(current) if current.is_directory != disk.is_directory => {
                    pass.extra.push(disk.path.clone());
                }
                Some(current) => {
                    if is_entry_modified(current, &disk) {
                        pass.stale.push(disk.path.clone());
                    }
                    seen.push(disk.path);
                    continue;
                }
            }
            seen.push(disk.path.clone());
            pass.missing.push(disk);
        }

        let on_disk: HashSet<&Path> = seen.iter().map(PathBuf::as_path).collect();
        pass.extra.extend(
            view.entries()
                .iter()
                .filter(|e| !on_disk.contains(e.path.as_path()))
                .map(|e| e.path.clone()),
        );
        pass
    }

    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.extra.is_empty() && self.stale.is_empty()
    }

    /// Applies the pass: removals, then insertions, then refreshes. Re-sorts if the view ends up
    /// out of order.
    pub fn apply(self, view: &mut SortedEntryView) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        for path in &self.extra {
            if let RemoveOutcome::Removed(_) = view.remove_by_path(path) {
                report.removed += 1;
            }
        }
        for entry in self.missing {
            if let InsertOutcome::Inserted(_) = view.insert_sorted(entry) {
                report.added += 1;
            }
        }
        for path in &self.stale {
            if let UpdateOutcome::Updated(_) = view.update_by_path(path) {
                report.updated += 1;
            }
        }

        if !view.is_sorted() {
            view.resort();
            report.resorted = true;
        }
        report
    }
}

/// Kind changes are handled by the caller.
fn is_entry_modified(current: &EntryMetadata, disk: &EntryMetadata) -> bool {
    current.size != disk.size
        || current.modified_at != disk.modified_at
        || current.is_symlink != disk.is_symlink
        || current.degraded != disk.degraded
}

/// Runs a full pass synchronously: enumerate, diff, apply.
///
/// Never fails. If the directory can't be listed any more, the view is emptied.
pub fn reconcile(view: &mut SortedEntryView) -> ReconcileReport {
    match list_directory(view.directory()) {
        Ok(entries) => apply_listing(view, entries),
        Err(e) => fall_back(view, &e),
    }
}

pub(crate) fn apply_listing(view: &mut SortedEntryView, entries: Vec<EntryMetadata>) -> ReconcileReport {
    let pass = ReconciliationPass::compute(view, entries);
    if pass.is_empty() && view.is_sorted() {
        return ReconcileReport::default();
    }
    log::debug!(
        "Reconcile {}: {} missing, {} extra, {} stale",
        view.directory().display(),
        pass.missing.len(),
        pass.extra.len(),
        pass.stale.len()
    );
    pass.apply(view)
}

pub(crate) fn fall_back(view: &mut SortedEntryView, err: &SyncError) -> ReconcileReport {
    log::warn!("Reconcile failed, clearing view: {}", err);
    let removed = view.len();
    view.reset(Vec::new());
    ReconcileReport {
        removed,
        fell_back: true,
        ..ReconcileReport::default()
    }
}
