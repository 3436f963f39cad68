//! Project and manifest data model.

use crate::diagnostics::DiagnosticLocation;
use crate::id::{ManifestId, ProjectId};
use crate::uid::UidPath;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::Url;

/// Version control settings of a project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VcsConfig {
    /// Repository root, defaults to the project directory
    #[serde(default)]
    pub root: Option<PathBuf>,
}

/// Structured project configuration produced by the config loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Globally unique project name, the first segment of every UID
    pub name: String,

    /// Marks the project as an authoritative root boundary
    #[serde(default)]
    pub root: bool,

    #[serde(default)]
    pub vcs: VcsConfig,

    /// Settings this crate does not interpret
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ProjectConfig {
    /// Default configuration with the given name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            root: false,
            vcs: VcsConfig::default(),
            extra: BTreeMap::new(),
        }
    }
}

/// A parsed config fragment, kept so diagnostics can point into it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSource {
    pub path: PathBuf,
    pub value: serde_json::Value,
}

/// A value found inside a [`ConfigSource`].
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValue {
    pub value: serde_json::Value,
    pub location: DiagnosticLocation,
}

impl ConfigSource {
    pub fn new(path: impl Into<PathBuf>, value: serde_json::Value) -> Self {
        Self {
            path: path.into(),
            value,
        }
    }

    /// Whether the top-level key is present.
    pub fn has(&self, key: &str) -> bool {
        self.value.get(key).is_some()
    }

    /// Look up a nested key, skipping explicit nulls.
    pub fn get_path(&self, key_path: &[&str]) -> Option<ConfigValue> {
        let mut current = &self.value;
        for key in key_path {
            current = current.get(*key)?;
        }
        if current.is_null() {
            return None;
        }
        Some(ConfigValue {
            value: current.clone(),
            location: DiagnosticLocation::key(&self.path, key_path.iter().copied()),
        })
    }

    /// Location of the whole source.
    pub fn location(&self) -> DiagnosticLocation {
        DiagnosticLocation::file(&self.path)
    }
}

/// Provenance of a loaded configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfigMeta {
    pub project_directory: PathBuf,

    /// The config file itself, absent for built-in projects
    pub config_path: Option<PathBuf>,

    /// Every other file the config consumed, in load order
    pub config_dependencies: Vec<PathBuf>,

    pub config_cache_keys: BTreeMap<String, String>,

    /// Source of the top-level config
    pub consumer: ConfigSource,

    /// Sources in resolution order, most specific first
    pub consumers_chain: Vec<ConfigSource>,
}

impl ProjectConfigMeta {
    /// Meta for a project with no config file on disk.
    pub fn mock(directory: &Path) -> Self {
        let consumer = ConfigSource::new(directory, serde_json::Value::Null);
        Self {
            project_directory: directory.to_path_buf(),
            config_path: None,
            config_dependencies: Vec::new(),
            config_cache_keys: BTreeMap::new(),
            consumers_chain: vec![consumer.clone()],
            consumer,
        }
    }

    /// The config file followed by all its dependencies.
    pub fn all_dependencies(&self) -> impl Iterator<Item = &PathBuf> {
        self.config_path.iter().chain(self.config_dependencies.iter())
    }
}

/// Output of the configuration loader.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedProjectConfig {
    pub config: ProjectConfig,
    pub meta: ProjectConfigMeta,
}

/// Package name as written in a manifest, possibly scoped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestName {
    pub scope: Option<String>,
    pub package_name: Option<String>,
}

impl ManifestName {
    pub fn new(package_name: impl Into<String>) -> Self {
        Self {
            scope: None,
            package_name: Some(package_name.into()),
        }
    }

    pub fn scoped(scope: impl Into<String>, package_name: impl Into<String>) -> Self {
        Self {
            scope: Some(scope.into()),
            package_name: Some(package_name.into()),
        }
    }

    /// `@scope/name`, `name`, or nothing when the package is unnamed.
    pub fn to_name_string(&self) -> Option<String> {
        let package_name = self.package_name.as_ref()?;
        match &self.scope {
            Some(scope) => Some(format!("@{}/{}", scope, package_name)),
            None => Some(package_name.clone()),
        }
    }
}

/// Parsed package descriptor content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub name: ManifestName,
    pub version: Option<String>,
}

/// A manifest located on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestDefinition {
    pub id: ManifestId,
    /// The manifest file
    pub path: PathBuf,
    /// Directory the manifest governs
    pub directory: PathBuf,
    pub manifest: Manifest,
}

impl ManifestDefinition {
    pub fn name(&self) -> Option<String> {
        self.manifest.name.to_name_string()
    }

    /// Location of the manifest's `name` field.
    pub fn name_location(&self) -> DiagnosticLocation {
        DiagnosticLocation::key(&self.path, ["name"])
    }
}

/// A loaded project node.
///
/// Linkage (`parent`, `root`, `children`) is stored as ids and resolved
/// through the project graph.
#[derive(Debug, Clone)]
pub struct ProjectDefinition {
    pub id: ProjectId,
    pub directory: PathBuf,
    pub config: Arc<ProjectConfig>,
    pub meta: Arc<ProjectConfigMeta>,
    pub parent: Option<ProjectId>,
    /// Topmost enclosing project, absent when this project is the top
    pub root: Option<ProjectId>,
    pub children: BTreeSet<ProjectId>,
    pub packages: BTreeMap<String, Arc<ManifestDefinition>>,
    pub manifests: BTreeMap<ManifestId, Arc<ManifestDefinition>>,
    pub initialized: bool,
    pub partial: bool,
}

impl ProjectDefinition {
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// The root pointer, or this project when it has none.
    pub fn root_or_self(&self) -> ProjectId {
        self.root.unwrap_or(self.id)
    }
}

/// Which entity owns a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileOwner {
    Project(ProjectId),
    Manifest(ManifestId),
}

/// Everything a worker needs to address a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReference {
    pub uid: UidPath,
    pub real: PathBuf,
    pub owner: FileOwner,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<Url>,
}
