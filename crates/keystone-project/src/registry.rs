//! Path-identity registry.
//!
//! Two bijections: absolute path ↔ UID, and absolute path ↔ remote URL.
//! Entries are permanent until the path is reported deleted.

use keystone_core::error::{KeystoneError, Result};
use keystone_core::uid::UidPath;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;
use url::Url;

#[derive(Debug, Default)]
struct Identities {
    uid_to_path: HashMap<UidPath, PathBuf>,
    path_to_uid: HashMap<PathBuf, UidPath>,
}

#[derive(Debug, Default)]
struct Remotes {
    remote_to_local: HashMap<Url, PathBuf>,
    local_to_remote: HashMap<PathBuf, Url>,
}

/// Registry of assigned UIDs and remote locations.
#[derive(Debug, Default)]
pub struct PathRegistry {
    identities: RwLock<Identities>,
    remotes: RwLock<Remotes>,
}

impl PathRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The UID previously registered for `path`.
    pub fn uid_for(&self, path: &Path) -> Option<UidPath> {
        self.identities.read().path_to_uid.get(path).cloned()
    }

    /// The path a UID was registered for.
    pub fn path_for_uid(&self, uid: &UidPath) -> Option<PathBuf> {
        self.identities.read().uid_to_path.get(uid).cloned()
    }

    /// Record `path ↔ uid`.
    ///
    /// # Errors
    ///
    /// Returns `UidCollision` if `uid` already belongs to a different path.
    /// The registry is left untouched in that case.
    pub fn register(&self, path: &Path, uid: UidPath) -> Result<()> {
        let mut identities = self.identities.write();

        if let Some(existing) = identities.uid_to_path.get(&uid) {
            if existing != path {
                return Err(KeystoneError::UidCollision {
                    uid,
                    path: path.to_path_buf(),
                    existing: existing.clone(),
                });
            }
        }

        if let Some(previous) = identities.path_to_uid.insert(path.to_path_buf(), uid.clone()) {
            if previous != uid {
                identities.uid_to_path.remove(&previous);
            }
        }
        debug!("Registered UID {} for {}", uid, path.display());
        identities.uid_to_path.insert(uid, path.to_path_buf());
        Ok(())
    }

    /// Record `local ↔ url`. Returns false if `url` was already registered.
    pub fn register_remote(&self, local: &Path, url: &Url) -> bool {
        let mut remotes = self.remotes.write();
        if remotes.remote_to_local.contains_key(url) {
            return false;
        }
        remotes.remote_to_local.insert(url.clone(), local.to_path_buf());
        if let Some(previous) = remotes.local_to_remote.insert(local.to_path_buf(), url.clone()) {
            remotes.remote_to_local.remove(&previous);
        }
        true
    }

    pub fn remote_for(&self, local: &Path) -> Option<Url> {
        self.remotes.read().local_to_remote.get(local).cloned()
    }

    pub fn local_for_remote(&self, url: &Url) -> Option<PathBuf> {
        self.remotes.read().remote_to_local.get(url).cloned()
    }

    /// Drop both mappings of a deleted path.
    pub fn forget(&self, path: &Path) {
        {
            let mut identities = self.identities.write();
            if let Some(uid) = identities.path_to_uid.remove(path) {
                identities.uid_to_path.remove(&uid);
            }
        }

        let mut remotes = self.remotes.write();
        if let Some(url) = remotes.local_to_remote.remove(path) {
            remotes.remote_to_local.remove(&url);
        }
    }

    /// Number of registered UIDs.
    pub fn len(&self) -> usize {
        self.identities.read().path_to_uid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
