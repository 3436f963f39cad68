//! Error types for the Keystone project graph.

use crate::diagnostics::Diagnostic;
use crate::uid::{UidPath, UidPathError};
use std::path::PathBuf;

/// Result type alias for Keystone operations.
pub type Result<T> = std::result::Result<T, KeystoneError>;

/// Main error type for the Keystone system.
#[derive(Debug, thiserror::Error)]
pub enum KeystoneError {
    /// Generic not found errors
    #[error("Not found: {resource} with id {id}")]
    NotFound { resource: String, id: String },

    /// A path is absent from the filesystem view
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// No loaded project encloses the path
    #[error("Expected existing project for {} only have {}", .path.display(), .loaded.join(", "))]
    ProjectNotFound { path: PathBuf, loaded: Vec<String> },

    /// Two projects declared the same name
    #[error(
        "Conflicting project name {name}. {} and {}",
        .directory.display(),
        .existing.display()
    )]
    DuplicateProjectName {
        name: String,
        directory: PathBuf,
        existing: PathBuf,
    },

    /// Two distinct paths computed the same UID
    #[error("UID collision between {} and {}: {uid}", .path.display(), .existing.display())]
    UidCollision {
        uid: UidPath,
        path: PathBuf,
        existing: PathBuf,
    },

    /// A path could not be expressed as a UID
    #[error("Invalid path: {0}")]
    InvalidPath(#[from] UidPathError),

    /// User-facing misconfiguration raised as an error
    #[error("{}", format_diagnostics(.0))]
    Diagnostics(Vec<Diagnostic>),

    /// Worker bridge errors
    #[error("Worker error: {0}")]
    Worker(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped anyhow errors for collaborator failures
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn format_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl KeystoneError {
    /// Create a new not found error
    pub fn not_found(resource: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.into(),
        }
    }

    /// Create a new worker error
    pub fn worker(msg: impl Into<String>) -> Self {
        Self::Worker(msg.into())
    }

    /// Create a new config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Wrap a single diagnostic as an error
    pub fn diagnostic(diagnostic: Diagnostic) -> Self {
        Self::Diagnostics(vec![diagnostic])
    }

    /// Check if this is a not found error of any kind
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::FileNotFound(_) | Self::ProjectNotFound { .. }
        )
    }

    /// Check if this error signals a broken graph or registry invariant
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::DuplicateProjectName { .. } | Self::UidCollision { .. }
        )
    }

    /// Check if this error carries diagnostics
    pub fn is_diagnostic(&self) -> bool {
        matches!(self, Self::Diagnostics(_))
    }

    /// Borrow the diagnostics carried by this error, if any
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Self::Diagnostics(diagnostics) => diagnostics,
            _ => &[],
        }
    }
}
