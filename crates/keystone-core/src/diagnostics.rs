//! User-facing misconfiguration reports.
//!
//! Rendering lives outside this crate; here we only describe what went wrong
//! and where, and collect the reports so a caller can continue with a partial
//! result instead of failing the whole request.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tracing::warn;

/// Where a diagnostic points: a file, and optionally a key inside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticLocation {
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_path: Vec<String>,
}

impl DiagnosticLocation {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            key_path: Vec::new(),
        }
    }

    pub fn key<I, S>(path: impl Into<PathBuf>, key_path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            path: path.into(),
            key_path: key_path.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for DiagnosticLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.key_path.is_empty() {
            write!(f, "{}", self.path.display())
        } else {
            write!(f, "{}#{}", self.path.display(), self.key_path.join("."))
        }
    }
}

/// What a diagnostic reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum DiagnosticDescription {
    #[error("Refusing to load project from sensitive directory {}", .directory.display())]
    LoadingSensitive { directory: PathBuf },

    #[error("Found potential typo config filename {basename}, expected one of {}", .expected.join(" or "))]
    TypoConfigFilename {
        basename: String,
        expected: Vec<String>,
    },

    #[error("Config file {basename} must be placed inside the {directory} directory")]
    MisplacedConfig { basename: String, directory: String },

    #[error("Duplicate package name {name}, already declared by {}", .existing.display())]
    DuplicatePackage { name: String, existing: PathBuf },

    #[error("{}", no_vcs_message(.root_configured))]
    NoVcs { root_configured: bool },

    #[error("Couldn't find a project")]
    ProjectNotFound,
}

fn no_vcs_message(root_configured: &bool) -> &'static str {
    if *root_configured {
        "Configured version control root is not a repository"
    } else {
        "Could not find a version control root, consider setting vcs.root"
    }
}

/// A single report with its location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub description: DiagnosticDescription,
    pub location: DiagnosticLocation,
}

impl Diagnostic {
    pub fn new(description: DiagnosticDescription, location: DiagnosticLocation) -> Self {
        Self {
            description,
            location,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.location, self.description)
    }
}

/// Thread-safe collector of diagnostics.
#[derive(Debug, Default)]
pub struct Diagnostics {
    entries: Mutex<Vec<Diagnostic>>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, diagnostic: Diagnostic) {
        warn!("{}", diagnostic);
        self.entries.lock().push(diagnostic);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Copy out the collected diagnostics.
    pub fn snapshot(&self) -> Vec<Diagnostic> {
        self.entries.lock().clone()
    }

    /// Drain the collected diagnostics.
    pub fn take(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.entries.lock())
    }
}
