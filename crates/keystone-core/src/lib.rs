//! Core types and abstractions for the Keystone project graph.
//!
//! This crate provides the data model shared by the project manager and its
//! collaborators:
//! - `ProjectDefinition` and `ManifestDefinition`, the graph's nodes and payloads
//! - `UidPath`, the machine-independent identity of a file
//! - `KeystoneError`, diagnostics, and the manager configuration
//! - Traits for the filesystem cache, config loader, worker pool and VCS

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod events;
pub mod id;
pub mod lock;
pub mod logging;
pub mod project;
pub mod traits;
pub mod uid;
pub mod worker;

pub use config::ManagerConfig;
pub use diagnostics::{Diagnostic, DiagnosticDescription, DiagnosticLocation, Diagnostics};
pub use error::{KeystoneError, Result};
pub use events::FileEvent;
pub use id::{ManifestId, ProjectId};
pub use lock::ProcessingLock;
pub use project::*;
pub use traits::*;
pub use uid::{MixedPath, UidPath, UidPathError};
pub use worker::*;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::ManagerConfig;
    pub use crate::diagnostics::{Diagnostic, DiagnosticDescription, DiagnosticLocation, Diagnostics};
    pub use crate::error::{KeystoneError, Result};
    pub use crate::id::{ManifestId, ProjectId};
    pub use crate::project::*;
    pub use crate::traits::*;
    pub use crate::uid::{MixedPath, UidPath};
    pub use crate::worker::*;
}
