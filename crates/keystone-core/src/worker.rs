//! Messages exchanged with workers.

use crate::id::{ManifestId, ProjectId};
use crate::project::ProjectConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// What a worker does, deciding which project events it receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkerKind {
    /// Analyses files and needs full project context
    Processor,
    /// Executes scripts and never consults projects
    ScriptRunner,
}

impl WorkerKind {
    pub fn consumes_projects(self) -> bool {
        !matches!(self, Self::ScriptRunner)
    }
}

/// Serialized view of a project sent to workers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerProject {
    pub config_cache_keys: BTreeMap<String, String>,
    pub config_path: Option<PathBuf>,
    pub config: ProjectConfig,
    pub directory: PathBuf,
}

pub type WorkerProjects = BTreeMap<ProjectId, WorkerProject>;

/// Manifest changes; `None` removes the manifest from the worker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestsUpdate {
    pub manifests: BTreeMap<ManifestId, Option<serde_json::Value>>,
}

/// Events crossing the worker bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum WorkerMessage {
    EvictProject(ProjectId),
    UpdateManifests(ManifestsUpdate),
    UpdateProjects(WorkerProjects),
}

impl WorkerMessage {
    pub fn name(&self) -> &'static str {
        match self {
            Self::EvictProject(_) => "evict_project",
            Self::UpdateManifests(_) => "update_manifests",
            Self::UpdateProjects(_) => "update_projects",
        }
    }
}
