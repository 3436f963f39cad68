//! Dependency index: which projects a path's contents feed into.

use dashmap::DashMap;
use keystone_core::id::ProjectId;
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

/// Map from a config dependency path to the ids of projects that consumed it.
#[derive(Debug, Default)]
pub struct DependencyIndex {
    entries: DashMap<PathBuf, HashSet<ProjectId>>,
}

impl DependencyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, path: &Path, project: ProjectId) {
        self.entries
            .entry(path.to_path_buf())
            .or_default()
            .insert(project);
    }

    /// Projects depending on `path`.
    pub fn get(&self, path: &Path) -> HashSet<ProjectId> {
        self.entries
            .get(path)
            .map(|ids| ids.clone())
            .unwrap_or_default()
    }

    /// Union of the projects depending on any of `paths`.
    pub fn projects_for<P: AsRef<Path>>(&self, paths: &[P]) -> BTreeSet<ProjectId> {
        let mut ids = BTreeSet::new();
        for path in paths {
            if let Some(found) = self.entries.get(path.as_ref()) {
                ids.extend(found.iter().copied());
            }
        }
        ids
    }

    /// Forget every reference to `project`, dropping paths left with no projects.
    pub fn remove_project(&self, project: ProjectId) {
        self.entries.retain(|_, ids| {
            ids.remove(&project);
            !ids.is_empty()
        });
    }

    pub fn remove_path(&self, path: &Path) {
        self.entries.remove(path);
    }

    pub fn references(&self, project: ProjectId) -> bool {
        self.entries.iter().any(|entry| entry.value().contains(&project))
    }

    /// Number of tracked paths.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
