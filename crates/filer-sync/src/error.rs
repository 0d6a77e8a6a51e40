//! Errors surfaced by directory-level operations.
//!
//! Per-entry failures never show up here: they produce degraded [`EntryMetadata`](crate::EntryMetadata)
//! instead. Watcher failures have their own type, [`WatchError`](crate::WatchError), because the
//! engine absorbs them.

use std::path::PathBuf;

/// Error type for enumeration and refresh.
#[derive(Debug)]
pub enum SyncError {
    /// The directory itself could not be opened (missing, not a directory, permission denied).
    DirectoryAccess { path: PathBuf, source: std::io::Error },
    /// A blocking enumeration task died before returning (panic or runtime shutdown).
    Background(String),
}

impl SyncError {
    pub(crate) fn directory_access(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::DirectoryAccess {
            path: path.to_path_buf(),
            source,
        }
    }

    /// True if the directory no longer exists, as opposed to being unreadable.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::DirectoryAccess { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DirectoryAccess { path, source } => {
                write!(f, "Cannot access directory {}: {}", path.display(), source)
            }
            Self::Background(msg) => write!(f, "Background enumeration failed: {}", msg),
        }
    }
}

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::DirectoryAccess { source, .. } => Some(source),
            Self::Background(_) => None,
        }
    }
}

impl From<tokio::task::JoinError> for SyncError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Background(err.to_string())
    }
}
