//! Project discovery: locate the config marker enclosing a path and load it.

use crate::graph::NewProject;
use crate::manager::ProjectManager;
use keystone_core::diagnostics::{
    Diagnostic, DiagnosticDescription, DiagnosticLocation, Diagnostics,
};
use keystone_core::error::{KeystoneError, Result};
use keystone_core::project::{LoadedProjectConfig, ProjectDefinition};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

impl ProjectManager {
    /// Find the project enclosing `path`, loading it from disk if needed.
    ///
    /// Waits for any in-flight eviction before looking. Returns `None` when
    /// no marker encloses `path` or the marker sits in a banned directory;
    /// the reason is reported through [`diagnostics`](Self::diagnostics).
    pub async fn find_project(
        &self,
        path: &Path,
        partial: bool,
    ) -> Result<Option<ProjectDefinition>> {
        self.fs.processing_lock().wait().await;
        self.locate_project(path, partial).await
    }

    /// [`find_project`](Self::find_project) without waiting on the
    /// processing lock, for callers that already hold it.
    pub(crate) async fn locate_project(
        &self,
        path: &Path,
        partial: bool,
    ) -> Result<Option<ProjectDefinition>> {
        if let Some(project) = self.find_loaded_project(path) {
            return self.upgrade_partial(project, path, partial).await.map(Some);
        }

        for dir in path.ancestors() {
            let Some(config_path) = self.detect_project_marker(dir).await? else {
                continue;
            };
            if self.is_loading_banned_project_path(dir, &config_path) {
                return Ok(None);
            }
            self.load_enclosing_projects(dir, partial).await?;
            return self.load_discovered(dir, &config_path, path, partial).await.map(Some);
        }

        self.report_incorrect_configs(path).await;
        info!("Found no project for {}", path.display());
        Ok(None)
    }

    /// Load the unloaded projects above `directory`, outermost first, so the
    /// project at `directory` is declared under its real parent.
    async fn load_enclosing_projects(&self, directory: &Path, partial: bool) -> Result<()> {
        let mut enclosing = Vec::new();
        for ancestor in directory.ancestors().skip(1) {
            if self.has_loaded_project_directory(ancestor) {
                break;
            }
            let Some(config_path) = self.detect_project_marker(ancestor).await? else {
                continue;
            };
            if self.is_banned_project_path(ancestor) {
                debug!("Skipping enclosing project in {}", ancestor.display());
                continue;
            }
            enclosing.push((ancestor, config_path));
        }

        for (ancestor, config_path) in enclosing.into_iter().rev() {
            if self.add_disk_project(ancestor, &config_path, partial).await? {
                self.fs.watch(ancestor, Some(directory), partial).await?;
            }
        }
        Ok(())
    }

    /// Re-watch a partially loaded project when the caller needs more of it.
    async fn upgrade_partial(
        &self,
        project: ProjectDefinition,
        path: &Path,
        partial: bool,
    ) -> Result<ProjectDefinition> {
        let rewatch = project.partial && (!partial || !self.fs.exists(path));
        if !rewatch {
            return Ok(project);
        }

        debug!("Upgrading partial project {}", project.directory.display());
        self.fs.watch(&project.directory, None, false).await?;

        let mut graph = self.graph.write();
        match graph.get_mut(project.id) {
            Some(current) => {
                current.partial = false;
                Ok(current.clone())
            }
            // Evicted while watching
            None => Ok(project),
        }
    }

    async fn load_discovered(
        &self,
        directory: &Path,
        config_path: &Path,
        path: &Path,
        partial: bool,
    ) -> Result<ProjectDefinition> {
        if self.add_disk_project(directory, config_path, partial).await? {
            self.fs.watch(directory, Some(path), partial).await?;
        }
        self.assert_project_existing(path)
    }

    /// Load and declare the project at `directory` unless it is already loaded.
    ///
    /// Concurrent calls for the same directory run one at a time; the later
    /// ones observe the first one's project and return false.
    pub async fn add_disk_project(
        &self,
        directory: &Path,
        config_path: &Path,
        partial: bool,
    ) -> Result<bool> {
        self.locks
            .with_lock(directory, || {
                self.load_unless_loaded(directory, config_path, partial)
            })
            .await
    }

    async fn load_unless_loaded(
        &self,
        directory: &Path,
        config_path: &Path,
        partial: bool,
    ) -> Result<bool> {
        if self.has_loaded_project_directory(directory) {
            debug!("Project at {} already loaded", directory.display());
            return Ok(false);
        }

        let LoadedProjectConfig { config, meta } = self
            .loader
            .load_complete_project_config(directory, config_path)
            .await?;

        self.declare_project(NewProject {
            directory: directory.to_path_buf(),
            config,
            meta,
            partial,
        })
        .await?;
        Ok(true)
    }

    /// The config file that makes `dir` a project, if any.
    ///
    /// A dedicated config inside the config directory wins over a package
    /// manifest carrying the project field.
    pub(crate) async fn detect_project_marker(&self, dir: &Path) -> Result<Option<PathBuf>> {
        let config_dir = dir.join(&self.config.config_directory);
        for filename in &self.config.config_filenames {
            let config_path = config_dir.join(filename);
            if self.fs.exists_hard(&config_path).await {
                return Ok(Some(config_path));
            }
        }

        let manifest_path = dir.join(&self.config.package_manifest_filename);
        if !self.fs.exists_hard(&manifest_path).await {
            return Ok(None);
        }

        let content = self.fs.read_to_string(&manifest_path).await?;
        match serde_json::from_str::<serde_json::Value>(&content) {
            Ok(manifest) if manifest.get(&self.config.package_json_field).is_some() => {
                Ok(Some(manifest_path))
            }
            Ok(_) => Ok(None),
            Err(e) => {
                warn!("Skipping unreadable manifest {}: {}", manifest_path.display(), e);
                Ok(None)
            }
        }
    }

    /// The filesystem root and sensitive directories are never projects.
    pub fn is_banned_project_path(&self, directory: &Path) -> bool {
        directory.parent().is_none()
            || self
                .config
                .sensitive_directories
                .iter()
                .any(|sensitive| sensitive == directory)
    }

    pub(crate) fn is_loading_banned_project_path(&self, directory: &Path, config_path: &Path) -> bool {
        if !self.is_banned_project_path(directory) {
            return false;
        }
        self.diagnostics.add(Diagnostic::new(
            DiagnosticDescription::LoadingSensitive {
                directory: directory.to_path_buf(),
            },
            DiagnosticLocation::file(config_path),
        ));
        true
    }

    async fn report_incorrect_configs(&self, path: &Path) {
        let candidates = self
            .config
            .warn_filenames
            .iter()
            .chain(self.config.config_filenames.iter());

        for dir in path.ancestors() {
            for basename in candidates.clone() {
                let candidate = dir.join(basename);
                if self.fs.exists_hard(&candidate).await {
                    self.check_path_for_incorrect_config(&candidate, &self.diagnostics);
                }
            }
        }
    }

    /// Report `path` if it is a misspelled config or a config outside the
    /// config directory.
    pub fn check_path_for_incorrect_config(&self, path: &Path, diagnostics: &Diagnostics) {
        let Some(basename) = path.file_name().and_then(|name| name.to_str()) else {
            return;
        };

        if self.config.is_warn_filename(basename) {
            diagnostics.add(Diagnostic::new(
                DiagnosticDescription::TypoConfigFilename {
                    basename: basename.to_string(),
                    expected: self.config.config_filenames.clone(),
                },
                DiagnosticLocation::file(path),
            ));
        }

        let in_config_dir = path
            .parent()
            .and_then(|parent| parent.file_name())
            .is_some_and(|name| name == self.config.config_directory.as_str());
        if self.config.is_config_filename(basename) && !in_config_dir {
            diagnostics.add(Diagnostic::new(
                DiagnosticDescription::MisplacedConfig {
                    basename: basename.to_string(),
                    directory: self.config.config_directory.clone(),
                },
                DiagnosticLocation::file(path),
            ));
        }
    }

    /// The loaded project enclosing `path`, discovering it if necessary.
    ///
    /// # Errors
    ///
    /// Fails when no project can be found. With a `location` the failure is
    /// a diagnostic pointing there.
    pub async fn assert_project(
        &self,
        path: &Path,
        location: Option<DiagnosticLocation>,
    ) -> Result<ProjectDefinition> {
        let found = match self.find_loaded_project(path) {
            Some(project) => Some(project),
            None => self.find_project(path, false).await?,
        };
        if let Some(project) = found {
            return Ok(project);
        }

        match location {
            Some(location) => Err(KeystoneError::diagnostic(Diagnostic::new(
                DiagnosticDescription::ProjectNotFound,
                location,
            ))),
            None => Err(KeystoneError::not_found(
                "project",
                format!(
                    "{} (checked {})",
                    path.display(),
                    self.config.config_filenames.join(" or ")
                ),
            )),
        }
    }
}
