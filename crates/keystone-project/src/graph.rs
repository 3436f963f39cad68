//! Project graph: an arena of project nodes keyed by id.
//!
//! Parent, root and child links are ids resolved through the arena, so the
//! graph holds no reference cycles. The graph is a plain data structure;
//! callers serialize access through the manager's lock.

use keystone_core::error::{KeystoneError, Result};
use keystone_core::id::ProjectId;
use keystone_core::project::{ProjectConfig, ProjectConfigMeta, ProjectDefinition};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Input for [`ProjectGraph::insert`].
#[derive(Debug, Clone)]
pub struct NewProject {
    pub directory: PathBuf,
    pub config: ProjectConfig,
    pub meta: ProjectConfigMeta,
    pub partial: bool,
}

#[derive(Debug, Default)]
pub struct ProjectGraph {
    projects: BTreeMap<ProjectId, ProjectDefinition>,
    directories: HashMap<PathBuf, ProjectId>,
    next_id: u64,
}

impl ProjectGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: ProjectId) -> Option<&ProjectDefinition> {
        self.projects.get(&id)
    }

    pub fn get_mut(&mut self, id: ProjectId) -> Option<&mut ProjectDefinition> {
        self.projects.get_mut(&id)
    }

    /// The project rooted exactly at `directory`.
    pub fn by_directory(&self, directory: &Path) -> Option<&ProjectDefinition> {
        self.directories
            .get(directory)
            .and_then(|id| self.projects.get(id))
    }

    pub fn contains_directory(&self, directory: &Path) -> bool {
        self.directories.contains_key(directory)
    }

    /// The nearest project whose directory is `path` or one of its ancestors.
    pub fn find_loaded(&self, path: &Path) -> Option<&ProjectDefinition> {
        path.ancestors().find_map(|dir| self.by_directory(dir))
    }

    pub fn find_by_name(&self, name: &str) -> Option<&ProjectDefinition> {
        self.projects.values().find(|project| project.name() == name)
    }

    /// Add a project, linking it under the nearest loaded project above it.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateProjectName` if a loaded project already uses the
    /// configured name. The graph is unchanged in that case.
    pub fn insert(&mut self, new: NewProject) -> Result<&ProjectDefinition> {
        if let Some(existing) = self.find_by_name(&new.config.name) {
            return Err(KeystoneError::DuplicateProjectName {
                name: new.config.name,
                directory: new.directory,
                existing: existing.directory.clone(),
            });
        }

        let parent = new
            .directory
            .parent()
            .and_then(|dir| self.find_loaded(dir))
            .map(|parent| (parent.id, parent.root_or_self()));

        let id = ProjectId::new(self.next_id);
        self.next_id += 1;

        let project = ProjectDefinition {
            id,
            directory: new.directory.clone(),
            config: Arc::new(new.config),
            meta: Arc::new(new.meta),
            parent: parent.map(|(parent, _)| parent),
            root: parent.map(|(_, root)| root),
            children: BTreeSet::new(),
            packages: BTreeMap::new(),
            manifests: BTreeMap::new(),
            initialized: false,
            partial: new.partial,
        };

        if let Some((parent, _)) = parent {
            if let Some(parent) = self.projects.get_mut(&parent) {
                parent.children.insert(id);
            }
        }
        self.directories.insert(new.directory, id);

        Ok(self.projects.entry(id).or_insert(project))
    }

    /// Drop a project from both indexes and from its parent's children.
    ///
    /// Children of the removed node lose their parent link.
    pub fn remove(&mut self, id: ProjectId) -> Option<ProjectDefinition> {
        let project = self.projects.remove(&id)?;

        if self.directories.get(&project.directory) == Some(&id) {
            self.directories.remove(&project.directory);
        }
        if let Some(parent) = project.parent.and_then(|p| self.projects.get_mut(&p)) {
            parent.children.remove(&id);
        }
        for child in &project.children {
            if let Some(child) = self.projects.get_mut(child) {
                child.parent = None;
            }
        }

        Some(project)
    }

    /// `id` followed by its ancestors, stopping after the first project
    /// that declares itself a root boundary.
    pub fn hierarchy(&self, id: ProjectId) -> Vec<ProjectId> {
        let mut chain = Vec::new();
        let mut current = self.projects.get(&id);

        while let Some(project) = current {
            chain.push(project.id);
            if project.config.root {
                break;
            }
            current = project.parent.and_then(|parent| self.projects.get(&parent));
        }

        chain
    }

    /// The furthest ancestor reachable through parent links.
    pub fn topmost(&self, id: ProjectId) -> ProjectId {
        let mut top = id;
        while let Some(parent) = self.projects.get(&top).and_then(|p| p.parent) {
            top = parent;
        }
        top
    }

    /// `top` and all of its descendants, parents before children.
    pub fn component(&self, top: ProjectId) -> Vec<ProjectId> {
        let mut ordered = Vec::new();
        let mut stack = vec![top];

        while let Some(id) = stack.pop() {
            let Some(project) = self.projects.get(&id) else {
                continue;
            };
            ordered.push(id);
            // Reverse so the smallest child is visited first
            stack.extend(project.children.iter().rev().copied());
        }

        ordered
    }

    pub fn projects(&self) -> impl Iterator<Item = &ProjectDefinition> {
        self.projects.values()
    }

    /// Loaded project directories, sorted.
    pub fn directories(&self) -> Vec<PathBuf> {
        let mut directories: Vec<_> = self.directories.keys().cloned().collect();
        directories.sort();
        directories
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}
