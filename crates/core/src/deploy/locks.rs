//! Per-repository mutual exclusion.
//!
//! Deployments of the same repository share one project directory, so only one
//! of them may touch it at a time. Different repositories proceed in parallel.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockMap = HashMap<String, Arc<AsyncMutex<()>>>;

/// Keyed locks, one per repository name.
#[derive(Debug, Clone, Default)]
pub struct RepoLocks {
    locks: Arc<Mutex<LockMap>>,
}

impl RepoLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other deployment of `repo` is running, then hold the lock
    /// until the returned guard is dropped.
    pub async fn acquire(&self, repo: &str) -> RepoGuard {
        let lock = {
            let mut locks = self.lock_map();
            Arc::clone(locks.entry(repo.to_string()).or_default())
        };

        let guard = lock.lock_owned().await;
        RepoGuard {
            repo: repo.to_string(),
            locks: Arc::clone(&self.locks),
            guard: Some(guard),
        }
    }

    /// Number of repositories with a deployment running or waiting.
    pub fn tracked(&self) -> usize {
        self.lock_map().len()
    }

    fn lock_map(&self) -> std::sync::MutexGuard<'_, LockMap> {
        self.locks.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Holds a repository lock. Unused entries are removed on drop.
#[derive(Debug)]
pub struct RepoGuard {
    repo: String,
    locks: Arc<Mutex<LockMap>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for RepoGuard {
    fn drop(&mut self) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        // release first so a waiter can proceed
        self.guard.take();
        if let Some(lock) = locks.get(&self.repo) {
            // only the map holds it: nobody running or waiting
            if Arc::strong_count(lock) == 1 {
                locks.remove(&self.repo);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_repo_waits() {
        let locks = RepoLocks::new();
        let first = locks.acquire("svc").await;

        let mut second = tokio_test::task::spawn(locks.acquire("svc"));
        tokio_test::assert_pending!(second.poll());

        drop(first);
        assert!(second.is_woken());
        let _guard = tokio_test::assert_ready!(second.poll());
    }

    #[tokio::test]
    async fn test_different_repos_do_not_block() {
        let locks = RepoLocks::new();
        let _a = locks.acquire("svc-a").await;
        let b = tokio::time::timeout(Duration::from_millis(200), locks.acquire("svc-b")).await;
        assert!(b.is_ok());
        assert_eq!(locks.tracked(), 2);
    }

    #[tokio::test]
    async fn test_entries_cleaned_up() {
        let locks = RepoLocks::new();
        {
            let _a = locks.acquire("svc").await;
            assert_eq!(locks.tracked(), 1);
        }
        assert_eq!(locks.tracked(), 0);
    }
}
