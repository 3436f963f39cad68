//! Interfaces of the collaborators the project manager depends on.
//!
//! None of these are implemented here: the filesystem cache, the config
//! parser, the worker pool and the VCS client all live elsewhere.

use crate::error::Result;
use crate::lock::ProcessingLock;
use crate::project::{LoadedProjectConfig, ManifestDefinition, ProjectDefinition};
use crate::worker::{WorkerKind, WorkerMessage};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Cached view of the filesystem.
#[async_trait]
pub trait MemoryFs: Send + Sync {
    /// Whether the path is known to the cache
    fn exists(&self, path: &Path) -> bool;

    /// Authoritative disk check bypassing the cache
    async fn exists_hard(&self, path: &Path) -> bool;

    async fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Start watching `directory`; with `partial` only `focus` is scanned
    async fn watch(&self, directory: &Path, focus: Option<&Path>, partial: bool) -> Result<()>;

    /// Drop every cached entry below `directory`
    fn unwatch(&self, directory: &Path);

    /// Stop emitting events for `directory`
    fn close(&self, directory: &Path);

    /// Every known file below `directory`
    fn glob(&self, directory: &Path) -> Vec<PathBuf>;

    /// The manifest of the nearest package enclosing `path`
    fn get_owned_manifest(&self, path: &Path) -> Option<Arc<ManifestDefinition>>;

    /// Worker-facing serialization of a manifest
    fn get_partial_manifest(
        &self,
        def: &ManifestDefinition,
        project: &ProjectDefinition,
    ) -> serde_json::Value;

    fn processing_lock(&self) -> &ProcessingLock;
}

/// Parses a project's configuration.
#[async_trait]
pub trait ConfigLoader: Send + Sync {
    async fn load_complete_project_config(
        &self,
        directory: &Path,
        config_path: &Path,
    ) -> Result<LoadedProjectConfig>;
}

/// Drops processed state for files.
#[async_trait]
pub trait FileAllocator: Send + Sync {
    async fn evict(&self, path: &Path, reason: &str) -> Result<()>;
}

/// One worker's end of the bridge.
#[async_trait]
pub trait WorkerHandle: Send + Sync {
    fn kind(&self) -> WorkerKind;

    /// Fire-and-forget event
    fn send(&self, message: WorkerMessage) -> Result<()>;

    /// Request that completes once the worker acknowledges
    async fn call(&self, message: WorkerMessage) -> Result<()>;
}

/// The set of active workers.
pub trait WorkerPool: Send + Sync {
    fn workers(&self) -> Vec<Arc<dyn WorkerHandle>>;
}

/// A version control client bound to a repository root.
pub trait VcsClient: Send + Sync {
    fn root(&self) -> &Path;
}

/// Opens version control clients.
#[async_trait]
pub trait VcsProvider: Send + Sync {
    async fn client_for(&self, root: &Path) -> Option<Arc<dyn VcsClient>>;
}
