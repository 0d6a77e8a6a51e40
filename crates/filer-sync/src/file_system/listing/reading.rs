//! Low-level directory reading.
//!
//! Pure I/O: opens a directory and turns readdir results into [`EntryMetadata`] in the order
//! the OS hands them out. No sorting, no tokio. Consumed by streaming.rs and the reconciler.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::DEFAULT_BATCH_SIZE;
use crate::error::SyncError;
use crate::file_system::listing::metadata::EntryMetadata;

/// A single-pass, unsorted sequence of a directory's children.
///
/// Children that readdir can't return are skipped; children that can't be stat'ed come back
/// degraded. Only failing to open the directory itself is an error.
pub struct DirectoryStream {
    directory: PathBuf,
    read_dir: fs::ReadDir,
    batch_size: usize,
    skipped: usize,
}

impl DirectoryStream {
    /// Opens `path` for enumeration. `batch_size` is clamped to at least 1.
    pub fn open(path: &Path, batch_size: usize) -> Result<Self, SyncError> {
        let read_dir = fs::read_dir(path).map_err(|e| SyncError::directory_access(path, e))?;
        Ok(Self {
            directory: path.to_path_buf(),
            read_dir,
            batch_size: batch_size.max(1),
            skipped: 0,
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Number of children skipped so far because readdir itself failed on them.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Pulls up to `batch_size` entries. Returns `None` once the directory is exhausted.
    pub fn next_batch(&mut self) -> Option<Vec<EntryMetadata>> {
        let batch_size = self.batch_size;
        let batch: Vec<EntryMetadata> = self.by_ref().take(batch_size).collect();
        if batch.is_empty() { None } else { Some(batch) }
    }
}

impl Iterator for DirectoryStream {
    type Item = EntryMetadata;

    fn next(&mut self) -> Option<Self::Item> {
        for result in self.read_dir.by_ref() {
            match result {
                Ok(entry) => return Some(EntryMetadata::from_dir_entry(&entry)),
                Err(e) => {
                    self.skipped += 1;
                    log::debug!("Skipping unreadable child of {}: {}", self.directory.display(), e);
                }
            }
        }
        None
    }
}

/// Lists a directory to completion, unsorted.
pub fn list_directory(path: &Path) -> Result<Vec<EntryMetadata>, SyncError> {
    let overall_start = std::time::Instant::now();
    let stream = DirectoryStream::open(path, DEFAULT_BATCH_SIZE)?;
    let entries: Vec<EntryMetadata> = stream.collect();
    log::debug!(
        "list_directory: path={}, entries={}, total={}ms",
        path.display(),
        entries.len(),
        overall_start.elapsed().as_millis()
    );
    Ok(entries)
}
