//! Per-project advisory locks

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::models::ProjectId;

/// In-memory map of async mutexes, one per project.
///
/// Held across hostname allocation and workload publish so that two workers
/// deploying the same project apply their updates one after the other.
#[derive(Default)]
pub struct ProjectLocks {
    locks: Mutex<HashMap<ProjectId, Arc<AsyncMutex<()>>>>,
}

impl ProjectLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for and take the lock of a project
    pub async fn acquire(&self, project_id: ProjectId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks
                .entry(project_id)
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Number of projects that have been locked at least once
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
