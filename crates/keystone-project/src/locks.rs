//! Per-directory load locks.
//!
//! Lock handles are created on first use and dropped from the table again
//! once no caller holds or waits on them.

use dashmap::DashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Keyed mutual exclusion over directories.
#[derive(Debug, Default)]
pub struct PathLocker {
    locks: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl PathLocker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `body` while holding the lock for `key`.
    ///
    /// Calls with the same key run one at a time; different keys never
    /// contend.
    pub async fn with_lock<F, Fut, T>(&self, key: &Path, body: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let handle = Handle {
            locks: &self.locks,
            key,
            lock: self
                .locks
                .entry(key.to_path_buf())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone(),
        };

        let _guard = match handle.lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                debug!("Waiting for load lock on {}", key.display());
                handle.lock.lock().await
            }
        };
        body().await
    }

    /// Whether some caller currently holds or waits on `key`.
    pub fn is_contended(&self, key: &Path) -> bool {
        self.locks.contains_key(key)
    }

    /// Number of live lock handles.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// A caller's share of a lock; the table entry goes away with the last one,
/// including when the caller is cancelled.
struct Handle<'a> {
    locks: &'a DashMap<PathBuf, Arc<Mutex<()>>>,
    key: &'a Path,
    lock: Arc<Mutex<()>>,
}

impl Drop for Handle<'_> {
    fn drop(&mut self) {
        // One reference in the table, one here
        self.locks.remove_if(self.key, |_, lock| {
            Arc::ptr_eq(lock, &self.lock) && Arc::strong_count(lock) == 2
        });
    }
}
