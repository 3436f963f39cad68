//! Manifest and package declaration across a project hierarchy.

use crate::manager::ProjectManager;
use keystone_core::diagnostics::{Diagnostic, DiagnosticDescription, Diagnostics};
use keystone_core::error::{KeystoneError, Result};
use keystone_core::id::ProjectId;
use keystone_core::project::ManifestDefinition;
use std::sync::Arc;
use tracing::info;

impl ProjectManager {
    /// Make a manifest visible to `project` and every ancestor up to the
    /// first root boundary.
    ///
    /// A project package whose name is already taken anywhere in that chain
    /// is reported to `diagnostics` and declared nowhere; returns false then.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if `project` is not loaded.
    pub fn declare_manifest(
        &self,
        project: ProjectId,
        is_project_package: bool,
        def: Arc<ManifestDefinition>,
        diagnostics: &Diagnostics,
    ) -> Result<bool> {
        let name = def.name();
        let kind = if is_project_package {
            "project package manifest"
        } else {
            "manifest"
        };
        info!(
            "Declaring {} {} in project {} in {}",
            kind,
            name.as_deref().unwrap_or("<unnamed>"),
            project,
            def.directory.display()
        );

        let mut graph = self.graph.write();
        let chain = graph.hierarchy(project);
        if chain.is_empty() {
            return Err(KeystoneError::not_found("project", project.to_string()));
        }

        let package_name = name.filter(|_| is_project_package);

        if let Some(name) = &package_name {
            let existing = chain
                .iter()
                .filter_map(|id| graph.get(*id))
                .find_map(|member| member.packages.get(name));
            if let Some(existing) = existing {
                diagnostics.add(Diagnostic::new(
                    DiagnosticDescription::DuplicatePackage {
                        name: name.clone(),
                        existing: existing.path.clone(),
                    },
                    def.name_location(),
                ));
                return Ok(false);
            }
        }

        for id in chain {
            let Some(member) = graph.get_mut(id) else {
                continue;
            };
            member.manifests.insert(def.id, Arc::clone(&def));
            if let Some(name) = &package_name {
                member.packages.insert(name.clone(), Arc::clone(&def));
            }
            self.dependencies.add(&def.path, id);
        }

        Ok(true)
    }
}
