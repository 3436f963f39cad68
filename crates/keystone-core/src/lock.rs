//! The global processing lock shared with the filesystem collaborator.
//!
//! Any number of scopes may hold the lock at once; waiters block until no
//! scope is active. Eviction holds it so discovery never observes a
//! half-torn-down project.

use std::future::Future;
use tokio::sync::watch;
use tracing::debug;

/// Counting gate: `wrap` marks work in flight, `wait` blocks until none is.
#[derive(Debug)]
pub struct ProcessingLock {
    active: watch::Sender<usize>,
}

impl Default for ProcessingLock {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessingLock {
    pub fn new() -> Self {
        let (active, _) = watch::channel(0);
        Self { active }
    }

    /// Run `body` with the lock held.
    pub async fn wrap<F, T>(&self, body: F) -> T
    where
        F: Future<Output = T>,
    {
        self.active.send_modify(|count| *count += 1);
        let _release = Release(&self.active);
        body.await
    }

    /// Wait until no scope holds the lock.
    pub async fn wait(&self) {
        let mut rx = self.active.subscribe();
        if *rx.borrow() > 0 {
            debug!("Waiting for processing lock");
        }
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|count| *count == 0).await;
    }

    pub fn is_locked(&self) -> bool {
        *self.active.borrow() > 0
    }
}

struct Release<'a>(&'a watch::Sender<usize>);

impl Drop for Release<'_> {
    fn drop(&mut self) {
        self.0.send_modify(|count| *count -= 1);
    }
}
