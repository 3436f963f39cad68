//! The project manager: owner of the project graph and its indexes.
//!
//! Discovery, eviction, manifest declaration, worker notification and
//! identity lookups are implemented in their own modules as further `impl`
//! blocks on [`ProjectManager`].

use crate::dependencies::DependencyIndex;
use crate::graph::{NewProject, ProjectGraph};
use crate::locks::PathLocker;
use crate::registry::PathRegistry;
use keystone_core::config::{ManagerConfig, VENDOR_PROJECT_NAME, VIRTUAL_MODULES_PROJECT_NAME};
use keystone_core::diagnostics::{Diagnostic, DiagnosticDescription, Diagnostics};
use keystone_core::error::{KeystoneError, Result};
use keystone_core::id::ProjectId;
use keystone_core::project::{
    ConfigSource, ConfigValue, ProjectConfig, ProjectConfigMeta, ProjectDefinition,
};
use keystone_core::traits::{
    ConfigLoader, FileAllocator, MemoryFs, VcsClient, VcsProvider, WorkerPool,
};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The external services a [`ProjectManager`] drives.
#[derive(Clone)]
pub struct Collaborators {
    pub fs: Arc<dyn MemoryFs>,
    pub loader: Arc<dyn ConfigLoader>,
    pub allocator: Arc<dyn FileAllocator>,
    pub workers: Arc<dyn WorkerPool>,
    pub vcs: Arc<dyn VcsProvider>,
}

/// Result of [`ProjectManager::find_project_config_consumer`].
#[derive(Debug, Clone)]
pub struct ProjectConfigSource {
    /// The project's top-level config source, for fallback locations
    pub consumer: ConfigSource,
    pub value: Option<ConfigValue>,
}

/// Discovers, tracks and invalidates projects.
pub struct ProjectManager {
    pub(crate) config: ManagerConfig,
    pub(crate) fs: Arc<dyn MemoryFs>,
    pub(crate) loader: Arc<dyn ConfigLoader>,
    pub(crate) allocator: Arc<dyn FileAllocator>,
    pub(crate) workers: Arc<dyn WorkerPool>,
    pub(crate) vcs: Arc<dyn VcsProvider>,

    pub(crate) registry: PathRegistry,
    pub(crate) dependencies: DependencyIndex,
    pub(crate) locks: PathLocker,
    pub(crate) graph: RwLock<ProjectGraph>,
    pub(crate) diagnostics: Arc<Diagnostics>,
}

impl ProjectManager {
    pub fn new(config: ManagerConfig, collaborators: Collaborators) -> Self {
        let Collaborators {
            fs,
            loader,
            allocator,
            workers,
            vcs,
        } = collaborators;

        Self {
            config,
            fs,
            loader,
            allocator,
            workers,
            vcs,
            registry: PathRegistry::new(),
            dependencies: DependencyIndex::new(),
            locks: PathLocker::new(),
            graph: RwLock::new(ProjectGraph::new()),
            diagnostics: Arc::new(Diagnostics::new()),
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Diagnostics raised by discovery.
    pub fn diagnostics(&self) -> &Arc<Diagnostics> {
        &self.diagnostics
    }

    /// Declare the built-in virtual-modules and vendor projects.
    pub async fn init(&self) -> Result<()> {
        let virtual_modules = self.config.virtual_modules_path.clone();
        self.declare_project(NewProject {
            meta: ProjectConfigMeta::mock(&virtual_modules),
            config: ProjectConfig::named(VIRTUAL_MODULES_PROJECT_NAME),
            directory: virtual_modules,
            partial: false,
        })
        .await?;

        let vendor = self.config.vendor_path.clone();
        tokio::fs::create_dir_all(&vendor).await?;
        self.declare_project(NewProject {
            meta: ProjectConfigMeta::mock(&vendor),
            config: ProjectConfig::named(VENDOR_PROJECT_NAME),
            directory: vendor.clone(),
            partial: false,
        })
        .await?;
        self.fs.watch(&vendor, None, false).await?;

        info!("Project manager initialized");
        Ok(())
    }

    /// Insert a project into the graph, index its config dependencies and
    /// tell the workers about it.
    ///
    /// When the workers cannot be told, the project is removed again and the
    /// workers that did hear about it are told to drop it.
    pub(crate) async fn declare_project(&self, new: NewProject) -> Result<ProjectDefinition> {
        let project = self.graph.write().insert(new)?.clone();

        info!(
            "Declared project {} from {}",
            project.id,
            project.directory.display()
        );

        for path in project.meta.all_dependencies() {
            self.dependencies.add(path, project.id);
        }

        let workers = self.workers.workers();
        if let Err(e) = self
            .notify_workers_of_projects(&workers, Some(std::slice::from_ref(&project)))
            .await
        {
            warn!(
                "Rolling back project {} at {}: {}",
                project.id,
                project.directory.display(),
                e
            );
            self.dependencies.remove_project(project.id);
            self.graph.write().remove(project.id);
            self.broadcast_eviction(&project);
            return Err(e);
        }

        Ok(project)
    }

    pub fn has_loaded_project_directory(&self, directory: &Path) -> bool {
        self.graph.read().contains_directory(directory)
    }

    /// The project rooted exactly at `directory`.
    pub fn get_project_from_path(&self, directory: &Path) -> Option<ProjectDefinition> {
        self.graph.read().by_directory(directory).cloned()
    }

    /// The nearest loaded project enclosing `path`.
    pub fn find_loaded_project(&self, path: &Path) -> Option<ProjectDefinition> {
        self.graph.read().find_loaded(path).cloned()
    }

    /// Like [`find_loaded_project`](Self::find_loaded_project) but fails
    /// when nothing encloses `path`.
    pub fn assert_project_existing(&self, path: &Path) -> Result<ProjectDefinition> {
        let graph = self.graph.read();
        match graph.find_loaded(path) {
            Some(project) => Ok(project.clone()),
            None => Err(KeystoneError::ProjectNotFound {
                path: path.to_path_buf(),
                loaded: graph
                    .directories()
                    .iter()
                    .map(|dir| dir.display().to_string())
                    .collect(),
            }),
        }
    }

    pub fn get_project(&self, id: ProjectId) -> Option<ProjectDefinition> {
        self.graph.read().get(id).cloned()
    }

    pub fn get_projects(&self) -> Vec<ProjectDefinition> {
        self.graph.read().projects().cloned().collect()
    }

    /// `project` and its ancestors up to and including the first root boundary.
    pub fn get_hierarchy_from_project(&self, project: ProjectId) -> Vec<ProjectDefinition> {
        let graph = self.graph.read();
        graph
            .hierarchy(project)
            .into_iter()
            .filter_map(|id| graph.get(id).cloned())
            .collect()
    }

    pub fn get_project_hierarchy_from_path(&self, path: &Path) -> Vec<ProjectDefinition> {
        let Some(id) = self.graph.read().find_loaded(path).map(|p| p.id) else {
            return Vec::new();
        };
        self.get_hierarchy_from_project(id)
    }

    /// The root of the project enclosing `path`, or that project itself.
    pub fn get_root_project_for_path(&self, path: &Path) -> Result<ProjectDefinition> {
        let project = self.assert_project_existing(path)?;
        match project.root.and_then(|root| self.get_project(root)) {
            Some(root) => Ok(root),
            None => Ok(project),
        }
    }

    /// Returns false if the project is no longer loaded.
    pub fn mark_initialized(&self, project: ProjectId) -> bool {
        match self.graph.write().get_mut(project) {
            Some(project) => {
                project.initialized = true;
                true
            }
            None => false,
        }
    }

    /// Find the first config source in the project's chain the `test`
    /// selects a value from.
    pub fn find_project_config_consumer<F>(
        &self,
        def: &ProjectDefinition,
        test: F,
    ) -> ProjectConfigSource
    where
        F: Fn(&ConfigSource) -> Option<ConfigValue>,
    {
        let value = def.meta.consumers_chain.iter().find_map(&test);
        ProjectConfigSource {
            consumer: def.meta.consumer.clone(),
            value,
        }
    }

    pub async fn maybe_get_vcs_client(
        &self,
        project: &ProjectDefinition,
    ) -> Option<Arc<dyn VcsClient>> {
        let root = project
            .config
            .vcs
            .root
            .clone()
            .unwrap_or_else(|| project.directory.clone());
        debug!("Opening version control client at {}", root.display());
        self.vcs.client_for(&root).await
    }

    /// # Errors
    ///
    /// Raises a `NoVcs` diagnostic located at the configured `vcs.root`, or
    /// at the config file when none was configured.
    pub async fn get_vcs_client(&self, project: &ProjectDefinition) -> Result<Arc<dyn VcsClient>> {
        if let Some(client) = self.maybe_get_vcs_client(project).await {
            return Ok(client);
        }

        let source = self.find_project_config_consumer(project, |source| {
            if source.has("vcs") {
                source.get_path(&["vcs", "root"])
            } else {
                None
            }
        });

        let root_configured = source.value.is_some();
        let location = match source.value {
            Some(value) => value.location,
            None => source.consumer.location(),
        };
        Err(KeystoneError::diagnostic(Diagnostic::new(
            DiagnosticDescription::NoVcs { root_configured },
            location,
        )))
    }

    /// Loaded project directories, sorted.
    pub fn loaded_directories(&self) -> Vec<PathBuf> {
        self.graph.read().directories()
    }
}
