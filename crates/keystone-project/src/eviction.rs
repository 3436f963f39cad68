//! Invalidation and eviction of projects.
//!
//! A change to any config dependency of a project evicts the whole connected
//! component around it, from the topmost ancestor down, and then reloads each
//! evicted directory. Everything runs inside one processing-lock scope so
//! discovery never observes a half torn down component.

use crate::manager::ProjectManager;
use futures::future::join_all;
use keystone_core::error::{KeystoneError, Result};
use keystone_core::events::FileEvent;
use keystone_core::id::ProjectId;
use keystone_core::project::ProjectDefinition;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const EVICTION_REASON: &str = "project dependency change";

impl ProjectManager {
    /// Evict every project component depending on one of `paths`.
    ///
    /// Returns whether anything was evicted.
    pub async fn maybe_evict_projects<P: AsRef<Path>>(&self, paths: &[P]) -> Result<bool> {
        let matched = self.dependencies.projects_for(paths);
        if matched.is_empty() {
            return Ok(false);
        }

        self.fs
            .processing_lock()
            .wrap(self.evict_components(matched.into_iter()))
            .await
    }

    async fn evict_components(&self, matched: impl Iterator<Item = ProjectId>) -> Result<bool> {
        let doomed = self.collect_components(matched);
        debug!("Evicting {} project(s)", doomed.len());

        let mut evicted = Vec::with_capacity(doomed.len());
        for id in doomed {
            if let Some(project) = self.teardown_project(id).await {
                evicted.push(project.directory);
            }
        }

        for directory in &evicted {
            self.reload_directory(directory).await?;
        }
        Ok(true)
    }

    /// Topmost ancestors of `ids` and all their descendants, deduplicated,
    /// parents before children.
    fn collect_components(&self, ids: impl Iterator<Item = ProjectId>) -> Vec<ProjectId> {
        let graph = self.graph.read();
        let mut seen = HashSet::new();
        let mut ordered = Vec::new();

        for id in ids {
            if graph.get(id).is_none() {
                continue;
            }
            for member in graph.component(graph.topmost(id)) {
                if seen.insert(member) {
                    ordered.push(member);
                }
            }
        }

        ordered
    }

    /// Tear down a project together with the projects nested below it, then
    /// optionally load their directories again, outermost first.
    ///
    /// Reloaded projects always get fresh ids.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the project is not loaded.
    pub async fn evict_project(&self, project: ProjectId, reload: bool) -> Result<()> {
        self.fs
            .processing_lock()
            .wrap(self.evict_and_reload(project, reload))
            .await
    }

    async fn evict_and_reload(&self, project: ProjectId, reload: bool) -> Result<()> {
        let subtree = {
            let graph = self.graph.read();
            if graph.get(project).is_none() {
                return Err(KeystoneError::not_found("project", project.to_string()));
            }
            graph.component(project)
        };

        let mut evicted = Vec::with_capacity(subtree.len());
        for id in subtree {
            if let Some(project) = self.teardown_project(id).await {
                evicted.push(project.directory);
            }
        }

        if reload {
            for directory in &evicted {
                self.reload_directory(directory).await?;
            }
        }
        Ok(())
    }

    /// Remove a project and everything it owns. Returns the removed node.
    ///
    /// Only the identities of owned files are purged; dependency entries of
    /// other projects stay in place.
    ///
    /// Worker and allocator failures are logged and do not stop the teardown.
    async fn teardown_project(&self, id: ProjectId) -> Option<ProjectDefinition> {
        let project = self.get_project(id)?;

        self.dependencies.remove_project(id);
        self.broadcast_eviction(&project);
        self.graph.write().remove(id);

        self.fs.close(&project.directory);

        let owned = self.fs.glob(&project.directory);
        let results = join_all(
            owned
                .iter()
                .map(|path| self.allocator.evict(path, EVICTION_REASON)),
        )
        .await;
        for (path, result) in owned.iter().zip(results) {
            if let Err(e) = result {
                warn!("Failed to evict {}: {}", path.display(), e);
            }
            self.registry.forget(path);
        }

        self.fs.unwatch(&project.directory);

        info!("Evicted project {} at {}", id, project.directory.display());
        Some(project)
    }

    /// Load the project at exactly `directory` again, if its marker survived.
    async fn reload_directory(&self, directory: &Path) -> Result<()> {
        if self.has_loaded_project_directory(directory) {
            return Ok(());
        }

        let Some(config_path) = self.detect_project_marker(directory).await? else {
            info!("Evicted project {} has no config left", directory.display());
            return Ok(());
        };
        if self.is_loading_banned_project_path(directory, &config_path) {
            return Ok(());
        }

        info!("Reloading evicted project {}", directory.display());
        if self.add_disk_project(directory, &config_path, false).await? {
            self.fs.watch(directory, None, false).await?;
        }
        Ok(())
    }

    /// Forget everything keyed by a path that no longer exists.
    pub(crate) fn handle_deleted(&self, path: &Path) {
        self.dependencies.remove_path(path);
        self.registry.forget(path);
    }

    /// Apply a batch of watcher events.
    ///
    /// Evicts projects depending on any touched path first, then purges the
    /// identities and dependency entries of removed paths.
    pub async fn handle_file_events(&self, events: &[FileEvent]) -> Result<bool> {
        let mut touched: Vec<PathBuf> = Vec::with_capacity(events.len());
        for event in events {
            if let Some(removed) = event.removed_path() {
                touched.push(removed.to_path_buf());
            }
            if !matches!(event, FileEvent::Deleted(_)) {
                touched.push(event.path().to_path_buf());
            }
        }

        let evicted = self.maybe_evict_projects(&touched).await?;

        for removed in events.iter().filter_map(FileEvent::removed_path) {
            self.handle_deleted(removed);
        }
        Ok(evicted)
    }

    /// Consume watcher event batches until the sender is dropped.
    pub fn spawn_event_listener(
        self: Arc<Self>,
        mut receiver: mpsc::UnboundedReceiver<Vec<FileEvent>>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(events) = receiver.recv().await {
                debug!("Received {} file event(s)", events.len());
                if let Err(e) = self.handle_file_events(&events).await {
                    warn!("Failed to process file events: {}", e);
                }
            }
            debug!("File event listener stopped");
        })
    }
}
