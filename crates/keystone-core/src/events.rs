//! Filesystem change events delivered by the watcher.

use std::path::{Path, PathBuf};

/// Events emitted by the file watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileEvent {
    Created(PathBuf),
    Modified(PathBuf),
    Deleted(PathBuf),
    Renamed { from: PathBuf, to: PathBuf },
}

impl FileEvent {
    /// The path the event leaves behind.
    pub fn path(&self) -> &Path {
        match self {
            Self::Created(p) | Self::Modified(p) | Self::Deleted(p) => p,
            Self::Renamed { to, .. } => to,
        }
    }

    /// The path that no longer exists after this event, if any.
    pub fn removed_path(&self) -> Option<&Path> {
        match self {
            Self::Deleted(p) => Some(p),
            Self::Renamed { from, .. } => Some(from),
            Self::Created(_) | Self::Modified(_) => None,
        }
    }
}
