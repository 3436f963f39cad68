//! UID assignment and file references.

use crate::manager::ProjectManager;
use keystone_core::error::{KeystoneError, Result};
use keystone_core::project::{FileOwner, FileReference};
use keystone_core::uid::{relative_segments, MixedPath, UidPath};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use url::Url;

/// Paths split into those that resolve to a file and those that do not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategorizedPaths {
    pub absolutes: BTreeSet<PathBuf>,
    pub unknowns: Vec<MixedPath>,
}

impl ProjectManager {
    /// The UID of `path`: the project name, the owning package's name when
    /// the package is not the project itself, then the path relative to
    /// whichever of the two it was rooted at.
    ///
    /// UIDs of existing paths are remembered until the path is deleted. With
    /// `allow_missing` a UID is still computed for a path that does not exist
    /// yet but is not remembered.
    ///
    /// # Errors
    ///
    /// `FileNotFound` for a missing path without `allow_missing`,
    /// `ProjectNotFound` when no project encloses the path, and
    /// `UidCollision` when the computed UID already belongs to another path.
    pub fn get_uid(&self, path: &Path, allow_missing: bool) -> Result<UidPath> {
        let exists = self.fs.exists(path);
        if !exists && !allow_missing {
            return Err(KeystoneError::FileNotFound(path.to_path_buf()));
        }

        if let Some(uid) = self.registry.uid_for(path) {
            return Ok(uid);
        }

        let project = self.assert_project_existing(path)?;
        let mut segments = vec![project.name().to_string()];
        let mut base = project.directory.as_path();

        let manifest = self.fs.get_owned_manifest(path);
        if let Some(manifest) = &manifest {
            if manifest.directory != project.directory {
                if let Some(name) = manifest.name() {
                    segments.push(name);
                    base = manifest.directory.as_path();
                }
            }
        }

        segments.extend(relative_segments(base, path)?);
        let uid = UidPath::from_segments(segments);

        if exists {
            self.registry.register(path, uid.clone())?;
        }
        Ok(uid)
    }

    /// The path a UID was assigned to, if `path` is a known UID.
    pub fn maybe_get_file_path_from_uid(&self, path: &MixedPath) -> Option<PathBuf> {
        path.as_uid().and_then(|uid| self.registry.path_for_uid(uid))
    }

    /// Resolve a UID through the registry, or pass an absolute path through.
    pub fn get_file_path_from_uid_or_absolute(&self, path: &MixedPath) -> Option<PathBuf> {
        if let Some(resolved) = self.maybe_get_file_path_from_uid(path) {
            return Some(resolved);
        }
        path.as_absolute().map(Path::to_path_buf)
    }

    pub fn categorize_paths<I>(&self, paths: I) -> CategorizedPaths
    where
        I: IntoIterator<Item = MixedPath>,
    {
        let mut categorized = CategorizedPaths::default();
        for path in paths {
            match self.get_file_path_from_uid_or_absolute(&path) {
                Some(absolute) => {
                    categorized.absolutes.insert(absolute);
                }
                None => categorized.unknowns.push(path),
            }
        }
        categorized
    }

    /// The remote URL `path` was fetched from, if any.
    pub fn get_remote_from_local_path(&self, path: &Path) -> Option<Url> {
        self.registry.remote_for(path)
    }

    /// Everything a worker needs to address `real`.
    pub fn get_file_reference(&self, real: &Path) -> Result<FileReference> {
        let project = self.assert_project_existing(real)?;
        let uid = self.get_uid(real, false)?;

        let owner = match self.fs.get_owned_manifest(real) {
            Some(manifest) => FileOwner::Manifest(manifest.id),
            None => FileOwner::Project(project.id),
        };

        Ok(FileReference {
            uid,
            real: real.to_path_buf(),
            owner,
            remote: self.registry.remote_for(real),
        })
    }

    /// Record that `local` holds the content of `url`, then reference it.
    pub fn get_url_file_reference(&self, local: &Path, url: &Url) -> Result<FileReference> {
        self.registry.register_remote(local, url);
        self.get_file_reference(local)
    }
}
