//! The sorted, incrementally maintained view of one directory.
//!
//! Every mutation runs to completion before its notification goes out, so a subscriber never
//! observes a half-applied change. Notifications are granular (insert/remove/update at an index)
//! so a display surface can patch rows instead of redrawing everything.

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::sync::broadcast;

use crate::file_system::listing::metadata::EntryMetadata;
use crate::file_system::listing::sorting::{SortDirection, SortKey, compare_entries, sort_entries};

/// Notifications buffered per subscriber before it starts lagging
pub const VIEW_CHANGE_CAPACITY: usize = 1024;

/// A change to the view, in mutation order.
///
/// Indices refer to the sequence right after the change. A subscriber that lags behind
/// (`RecvError::Lagged`) should resynchronize from [`SortedEntryView::entries`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ViewChange {
    /// Whole sequence replaced (refresh, re-sort, new directory).
    Reset { len: usize },
    Inserted { index: usize, entry: EntryMetadata },
    Removed { index: usize, path: PathBuf },
    Updated { index: usize, entry: EntryMetadata },
    /// Remove at `removed_at`, then insert at `inserted_at`. One logical change.
    Renamed {
        removed_at: usize,
        inserted_at: usize,
        entry: EntryMetadata,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(usize),
    AlreadyPresent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed(usize),
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated(usize),
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameOutcome {
    Renamed { removed_at: usize, inserted_at: usize },
    /// Source unknown: handled as a newly appeared destination.
    Inserted(InsertOutcome),
    /// Destination left the directory.
    Removed(RemoveOutcome),
    /// Destination already existed: source removed, destination refreshed.
    Overwrote { removed_at: usize, updated: UpdateOutcome },
    /// Source and destination are the same path.
    Unchanged(UpdateOutcome),
    /// Neither path belongs to this view.
    Ignored,
}

/// Directory vs. file tally for status displays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryCounts {
    pub directories: usize,
    pub files: usize,
}

impl std::fmt::Display for EntryCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} directories, {} files", self.directories, self.files)
    }
}

/// Ordered entries of one directory, unique by path.
pub struct SortedEntryView {
    directory: PathBuf,
    entries: Vec<EntryMetadata>,
    /// Membership index, kept in lockstep with `entries`
    paths: HashSet<PathBuf>,
    key: SortKey,
    direction: SortDirection,
    notifier: broadcast::Sender<ViewChange>,
}

impl SortedEntryView {
    /// Creates an empty view that publishes on `notifier`. Emits `Reset { len: 0 }`.
    pub fn new(
        directory: &Path,
        key: SortKey,
        direction: SortDirection,
        notifier: broadcast::Sender<ViewChange>,
    ) -> Self {
        let view = Self {
            directory: directory.to_path_buf(),
            entries: Vec::new(),
            paths: HashSet::new(),
            key,
            direction,
            notifier,
        };
        view.notify(ViewChange::Reset { len: 0 });
        view
    }

    /// Creates an empty view with its own notification channel and the default sort.
    pub fn detached(directory: &Path) -> Self {
        let (notifier, _) = broadcast::channel(VIEW_CHANGE_CAPACITY);
        Self::new(directory, SortKey::default(), SortDirection::default(), notifier)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ViewChange> {
        self.notifier.subscribe()
    }

    fn notify(&self, change: ViewChange) {
        // Fails only when nobody is subscribed
        let _ = self.notifier.send(change);
    }

    fn compare(&self, a: &EntryMetadata, b: &EntryMetadata) -> Ordering {
        compare_entries(a, b, self.key, self.direction)
    }

    /// Sorted insertion point for `entry` (binary search).
    fn position_for(&self, entry: &EntryMetadata) -> usize {
        self.entries
            .partition_point(|existing| self.compare(existing, entry) == Ordering::Less)
    }

    fn is_child(&self, path: &Path) -> bool {
        path.parent() == Some(self.directory.as_path())
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Replaces the whole sequence. Duplicate paths keep their first occurrence.
    pub fn reset(&mut self, mut entries: Vec<EntryMetadata>) {
        let mut paths = HashSet::with_capacity(entries.len());
        entries.retain(|e| paths.insert(e.path.clone()));
        sort_entries(&mut entries, self.key, self.direction);
        self.entries = entries;
        self.paths = paths;
        self.notify(ViewChange::Reset { len: self.entries.len() });
    }

    /// Inserts at the sorted position. Idempotent by path.
    pub fn insert_sorted(&mut self, entry: EntryMetadata) -> InsertOutcome {
        if self.paths.contains(&entry.path) {
            return InsertOutcome::AlreadyPresent;
        }
        let index = self.position_for(&entry);
        self.paths.insert(entry.path.clone());
        self.entries.insert(index, entry.clone());
        self.notify(ViewChange::Inserted { index, entry });
        InsertOutcome::Inserted(index)
    }

    /// Merges a batch in one pass. Same result as calling `insert_sorted` for each entry,
    /// without the quadratic shifting on large directories.
    ///
    /// Emits one `Inserted` per new entry in ascending index order; replaying them in that
    /// order reproduces the view. Returns how many entries were new.
    pub fn insert_batch(&mut self, batch: Vec<EntryMetadata>) -> usize {
        let mut fresh: Vec<EntryMetadata> = batch
            .into_iter()
            .filter(|e| self.paths.insert(e.path.clone()))
            .collect();
        if fresh.is_empty() {
            return 0;
        }
        let (key, direction) = (self.key, self.direction);
        sort_entries(&mut fresh, key, direction);

        let old = std::mem::take(&mut self.entries);
        let mut merged = Vec::with_capacity(old.len() + fresh.len());
        let mut inserted_at = Vec::with_capacity(fresh.len());
        let mut old_iter = old.into_iter().peekable();
        for entry in fresh {
            while let Some(existing) =
                old_iter.next_if(|existing| compare_entries(existing, &entry, key, direction) != Ordering::Greater)
            {
                merged.push(existing);
            }
            inserted_at.push(merged.len());
            merged.push(entry);
        }
        merged.extend(old_iter);
        self.entries = merged;

        for &index in &inserted_at {
            self.notify(ViewChange::Inserted {
                index,
                entry: self.entries[index].clone(),
            });
        }
        inserted_at.len()
    }

    /// Removes the entry with this path (linear scan).
    pub fn remove_by_path(&mut self, path: &Path) -> RemoveOutcome {
        let Some(index) = self.position(path) else {
            return RemoveOutcome::NotFound;
        };
        let removed = self.entries.remove(index);
        self.paths.remove(&removed.path);
        self.notify(ViewChange::Removed {
            index,
            path: removed.path,
        });
        RemoveOutcome::Removed(index)
    }

    /// Re-resolves the entry's metadata in place.
    ///
    /// The entry keeps its position even if size or time now sort it elsewhere; the next
    /// reconciliation or re-sort puts it back in order.
    pub fn update_by_path(&mut self, path: &Path) -> UpdateOutcome {
        let Some(index) = self.position(path) else {
            return UpdateOutcome::NotFound;
        };
        self.entries[index].refresh();
        self.notify(ViewChange::Updated {
            index,
            entry: self.entries[index].clone(),
        });
        UpdateOutcome::Updated(index)
    }

    /// Applies a rename as one logical change.
    pub fn rename(&mut self, from: &Path, to: &Path) -> RenameOutcome {
        let to_tracked = self.is_child(to);
        let Some(removed_at) = self.position(from) else {
            if !to_tracked {
                return RenameOutcome::Ignored;
            }
            return RenameOutcome::Inserted(self.insert_sorted(EntryMetadata::resolve(to)));
        };
        if !to_tracked {
            return RenameOutcome::Removed(self.remove_by_path(from));
        }
        if from == to {
            return RenameOutcome::Unchanged(self.update_by_path(to));
        }
        if self.paths.contains(to) {
            self.remove_by_path(from);
            let updated = self.update_by_path(to);
            return RenameOutcome::Overwrote { removed_at, updated };
        }

        let old = self.entries.remove(removed_at);
        self.paths.remove(&old.path);
        let entry = EntryMetadata::resolve(to);
        let inserted_at = self.position_for(&entry);
        self.paths.insert(entry.path.clone());
        self.entries.insert(inserted_at, entry.clone());
        self.notify(ViewChange::Renamed {
            removed_at,
            inserted_at,
            entry,
        });
        RenameOutcome::Renamed {
            removed_at,
            inserted_at,
        }
    }

    /// Re-sorts everything under a new key. Directories stay first.
    pub fn change_sort(&mut self, key: SortKey, direction: SortDirection) {
        self.key = key;
        self.direction = direction;
        self.resort();
    }

    /// Re-sorts under the current key, fixing positions left stale by `update_by_path`.
    pub fn resort(&mut self) {
        sort_entries(&mut self.entries, self.key, self.direction);
        self.notify(ViewChange::Reset { len: self.entries.len() });
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn entries(&self) -> &[EntryMetadata] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&EntryMetadata> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.paths.contains(path)
    }

    /// Index of the entry with this path.
    pub fn position(&self, path: &Path) -> Option<usize> {
        if !self.paths.contains(path) {
            return None;
        }
        self.entries.iter().position(|e| e.path == path)
    }

    /// Member paths, for reconciliation snapshots.
    pub fn path_set(&self) -> &HashSet<PathBuf> {
        &self.paths
    }

    /// Current sort key and direction.
    pub fn sort(&self) -> (SortKey, SortDirection) {
        (self.key, self.direction)
    }

    pub fn is_sorted(&self) -> bool {
        self.entries
            .windows(2)
            .all(|pair| self.compare(&pair[0], &pair[1]) != Ordering::Greater)
    }

    pub fn counts(&self) -> EntryCounts {
        let directories = self.entries.iter().filter(|e| e.is_directory).count();
        EntryCounts {
            directories,
            files: self.entries.len() - directories,
        }
    }
}
