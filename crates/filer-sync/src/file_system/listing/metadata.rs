//! Entry metadata type and resolution helpers.

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// One child of a watched directory.
///
/// Resolution never fails: if the entry can't be stat'ed (permission denied, vanished
/// between readdir and stat), it comes back `degraded` with zero size and time so it
/// still shows up in the view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryMetadata {
    /// Absolute path, the identity key within one view
    pub path: PathBuf,
    pub name: String,
    /// Resolved once at construction, never re-derived (symlinks to directories count as directories)
    pub is_directory: bool,
    pub is_symlink: bool,
    /// Bytes; always 0 for directories
    pub size: u64,
    /// Seconds since the Unix epoch, 0 when unknown
    pub modified_at: u64,
    /// "Directory", the uppercased extension, or "File"
    pub type_label: String,
    pub degraded: bool,
}

impl EntryMetadata {
    /// Resolves metadata for a single path, following symlinks.
    pub fn resolve(path: &Path) -> Self {
        let is_symlink = fs::symlink_metadata(path)
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false);

        match fs::metadata(path) {
            Ok(metadata) => Self::from_metadata(path.to_path_buf(), is_symlink, &metadata),
            Err(e) => Self::degraded(path.to_path_buf(), is_symlink, &e),
        }
    }

    /// Builds an entry from a readdir result.
    /// Uses the cheap `DirEntry` metadata for plain entries and only follows symlinks when needed.
    pub fn from_dir_entry(entry: &fs::DirEntry) -> Self {
        let path = entry.path();
        match entry.file_type() {
            Ok(file_type) if !file_type.is_symlink() => match entry.metadata() {
                Ok(metadata) => Self::from_metadata(path, false, &metadata),
                Err(e) => Self::degraded(path, false, &e),
            },
            _ => Self::resolve(&path),
        }
    }

    fn from_metadata(path: PathBuf, is_symlink: bool, metadata: &fs::Metadata) -> Self {
        let name = file_name_of(&path);
        let is_directory = metadata.is_dir();
        Self {
            type_label: type_label_for(&name, is_directory),
            size: if is_directory { 0 } else { metadata.len() },
            modified_at: modified_secs(metadata),
            path,
            name,
            is_directory,
            is_symlink,
            degraded: false,
        }
    }

    fn degraded(path: PathBuf, is_symlink: bool, err: &std::io::Error) -> Self {
        log::debug!("Metadata unavailable for {}: {}", path.display(), err);
        let name = file_name_of(&path);
        Self {
            type_label: type_label_for(&name, false),
            size: 0,
            modified_at: 0,
            path,
            name,
            is_directory: false,
            is_symlink,
            degraded: true,
        }
    }

    /// Re-reads size, modification time and the symlink flag. The entry kind stays as first resolved.
    pub fn refresh(&mut self) {
        self.is_symlink = fs::symlink_metadata(&self.path)
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false);
        match fs::metadata(&self.path) {
            Ok(metadata) => {
                self.size = if self.is_directory { 0 } else { metadata.len() };
                self.modified_at = modified_secs(&metadata);
                self.degraded = false;
            }
            Err(e) => {
                log::debug!("Metadata refresh failed for {}: {}", self.path.display(), e);
                self.size = 0;
                self.modified_at = 0;
                self.degraded = true;
            }
        }
    }

    /// Human-readable size, "<DIR>" for directories.
    pub fn display_size(&self) -> String {
        if self.is_directory {
            return "<DIR>".to_string();
        }
        let mut size = self.size as f64;
        for unit in ["B", "KB", "MB", "GB", "TB"] {
            if size < 1024.0 {
                return format!("{:.1} {}", size, unit);
            }
            size /= 1024.0;
        }
        format!("{:.1} PB", size)
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

fn modified_secs(metadata: &fs::Metadata) -> u64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Dotfiles like ".bashrc" and names ending in "." have no extension.
pub(crate) fn type_label_for(name: &str, is_directory: bool) -> String {
    if is_directory {
        return "Directory".to_string();
    }
    match Path::new(name).extension() {
        Some(ext) if !ext.is_empty() => ext.to_string_lossy().to_uppercase(),
        _ => "File".to_string(),
    }
}
