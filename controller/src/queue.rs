//! Build queue
//!
//! Unbounded FIFO of deployment ids shared by ingestion (producer) and the
//! worker pool (consumers). In memory only; queued ids are lost on restart.

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::errors::QueueError;
use crate::models::DeploymentId;

#[derive(Debug, Default)]
pub struct BuildQueue {
    items: Mutex<VecDeque<DeploymentId>>,
    notify: Notify,
}

impl BuildQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a deployment id; never blocks
    pub fn enqueue(&self, id: DeploymentId) {
        let size = {
            let mut items = self.items.lock().unwrap_or_else(|e| e.into_inner());
            items.push_back(id);
            items.len()
        };
        debug!("Enqueued deployment {} (queue size {})", id, size);
        self.notify.notify_one();
    }

    /// Wait for the oldest id, or until `cancel` fires
    pub async fn dequeue(&self, cancel: &CancellationToken) -> Result<DeploymentId, QueueError> {
        loop {
            if let Some(id) = self.pop() {
                return Ok(id);
            }

            // notify_one stores a permit when nobody waits, so an enqueue
            // between pop and here is not missed
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(QueueError::Cancelled),
                _ = self.notify.notified() => {}
            }
        }
    }

    /// Number of queued ids at the time of the call
    pub fn size(&self) -> usize {
        self.items.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    fn pop(&self) -> Option<DeploymentId> {
        let id = self
            .items
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        // pass the wakeup on while items remain so parked consumers drain them
        if id.is_some() && !self.is_empty() {
            self.notify.notify_one();
        }
        id
    }
}
