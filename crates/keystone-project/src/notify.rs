//! Keeps each worker's view of projects and manifests in step with the graph.

use crate::manager::ProjectManager;
use futures::future::join_all;
use keystone_core::error::{KeystoneError, Result};
use keystone_core::project::ProjectDefinition;
use keystone_core::traits::WorkerHandle;
use keystone_core::worker::{ManifestsUpdate, WorkerMessage, WorkerProject, WorkerProjects};
use std::sync::Arc;
use tracing::{debug, warn};

impl ProjectManager {
    /// Send `projects` (all loaded projects by default) and their manifests
    /// to every worker that consumes project state.
    ///
    /// All calls are issued concurrently.
    ///
    /// # Errors
    ///
    /// Returns a single `Worker` error describing every failed call.
    pub async fn notify_workers_of_projects(
        &self,
        workers: &[Arc<dyn WorkerHandle>],
        projects: Option<&[ProjectDefinition]>,
    ) -> Result<()> {
        let all;
        let projects = match projects {
            Some(projects) => projects,
            None => {
                all = self.get_projects();
                &all[..]
            }
        };

        let mut worker_projects = WorkerProjects::new();
        let mut manifests = ManifestsUpdate::default();
        for project in projects {
            worker_projects.insert(
                project.id,
                WorkerProject {
                    config_cache_keys: project.meta.config_cache_keys.clone(),
                    config_path: project.meta.config_path.clone(),
                    config: (*project.config).clone(),
                    directory: project.directory.clone(),
                },
            );

            for (id, def) in &project.manifests {
                manifests
                    .manifests
                    .insert(*id, Some(self.fs.get_partial_manifest(def, project)));
            }
        }

        let calls = workers
            .iter()
            .filter(|worker| worker.kind().consumes_projects())
            .flat_map(|worker| {
                [
                    worker.call(WorkerMessage::UpdateProjects(worker_projects.clone())),
                    worker.call(WorkerMessage::UpdateManifests(manifests.clone())),
                ]
            })
            .collect::<Vec<_>>();

        let total = calls.len();
        debug!("Sending {} project update call(s) to workers", total);

        let failures: Vec<String> = join_all(calls)
            .await
            .into_iter()
            .filter_map(|result| result.err().map(|e| e.to_string()))
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(KeystoneError::worker(format!(
                "{} of {} worker calls failed: {}",
                failures.len(),
                total,
                failures.join("; ")
            )))
        }
    }

    /// Tell every worker to drop a project and all of its manifests.
    pub(crate) fn broadcast_eviction(&self, project: &ProjectDefinition) {
        let mut removed = ManifestsUpdate::default();
        for id in project.manifests.keys() {
            removed.manifests.insert(*id, None);
        }

        for worker in self.workers.workers() {
            let sent = worker
                .send(WorkerMessage::EvictProject(project.id))
                .and_then(|()| worker.send(WorkerMessage::UpdateManifests(removed.clone())));
            if let Err(e) = sent {
                warn!("Failed to notify worker of evicted project {}: {}", project.id, e);
            }
        }
    }
}
