//! Worker pool draining the build queue

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::deploy::pipeline::BuildPipeline;
use crate::errors::{ControllerError, QueueError};
use crate::models::{DeploymentId, DeploymentStatus};
use crate::queue::BuildQueue;
use crate::store::{DeploymentUpdate, RecordStore};

pub const DEFAULT_WORKERS: usize = 3;

/// Worker pool options
#[derive(Debug, Clone)]
pub struct Options {
    /// Number of concurrent workers
    pub workers: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
        }
    }
}

/// Fixed set of workers, each running dequeue -> pipeline in a loop
pub struct WorkerPool {
    options: Options,
    queue: Arc<BuildQueue>,
    store: Arc<dyn RecordStore>,
    pipeline: Arc<BuildPipeline>,
    cancel: CancellationToken,
    started: AtomicBool,
    in_flight: Arc<AtomicUsize>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    pub fn new(
        options: Options,
        queue: Arc<BuildQueue>,
        store: Arc<dyn RecordStore>,
        pipeline: Arc<BuildPipeline>,
    ) -> Self {
        Self {
            options,
            queue,
            store,
            pipeline,
            cancel: CancellationToken::new(),
            started: AtomicBool::new(false),
            in_flight: Arc::new(AtomicUsize::new(0)),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Spawn the workers; a pool can only be started once
    pub fn start(&self) -> Result<(), ControllerError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(ControllerError::Internal(
                "worker pool already started".to_string(),
            ));
        }

        let workers = self.options.workers.max(1);
        info!("Starting worker pool with {} workers", workers);

        let mut handles = self.handles.lock().unwrap_or_else(|e| e.into_inner());
        for worker_id in 0..workers {
            let worker = Worker {
                id: worker_id,
                queue: self.queue.clone(),
                store: self.store.clone(),
                pipeline: self.pipeline.clone(),
                in_flight: self.in_flight.clone(),
            };
            let cancel = self.cancel.clone();
            handles.push(tokio::spawn(async move { worker.run(cancel).await }));
        }
        Ok(())
    }

    /// Cancel every worker and wait until all of them have returned
    pub async fn stop(&self) -> Result<(), ControllerError> {
        info!("Stopping worker pool...");
        self.cancel.cancel();

        let handles: Vec<_> = self
            .handles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();

        let mut result = Ok(());
        for joined in join_all(handles).await {
            if let Err(e) = joined {
                error!("Worker task failed: {}", e);
                result = Err(ControllerError::ShutdownError(e.to_string()));
            }
        }

        info!("Worker pool stopped");
        result
    }

    /// Whether workers have been started and not yet told to stop
    pub fn is_running(&self) -> bool {
        self.started.load(Ordering::SeqCst) && !self.cancel.is_cancelled()
    }

    /// Number of jobs currently being processed
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

struct Worker {
    id: usize,
    queue: Arc<BuildQueue>,
    store: Arc<dyn RecordStore>,
    pipeline: Arc<BuildPipeline>,
    in_flight: Arc<AtomicUsize>,
}

/// Counts a job as in flight until dropped
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter.clone())
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Worker {
    async fn run(self, cancel: CancellationToken) {
        debug!(worker = self.id, "Worker starting...");

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let deployment_id = match self.queue.dequeue(&cancel).await {
                Ok(id) => id,
                Err(QueueError::Cancelled) => break,
            };

            let _in_flight = InFlight::enter(&self.in_flight);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!(
                        worker = self.id,
                        deployment_id = %deployment_id,
                        "Shutdown interrupted deployment"
                    );
                    break;
                }
                _ = self.process(deployment_id) => {}
            }
        }

        debug!(worker = self.id, "Worker shutting down...");
    }

    async fn process(&self, deployment_id: DeploymentId) {
        info!(worker = self.id, deployment_id = %deployment_id, "Processing deployment");

        if let Err(e) = self
            .store
            .update_deployment(
                deployment_id,
                DeploymentUpdate::status(DeploymentStatus::Building),
            )
            .await
        {
            error!(deployment_id = %deployment_id, "Failed to start deployment: {}", e);
            return;
        }

        match self.pipeline.run(deployment_id).await {
            Ok(deployment) => {
                info!(
                    deployment_id = %deployment_id,
                    "Deployment finished with status {}", deployment.status
                );
            }
            Err(e) => {
                error!(deployment_id = %deployment_id, "Deployment failed: {}", e);
                self.mark_failed(deployment_id).await;
            }
        }
    }

    async fn mark_failed(&self, deployment_id: DeploymentId) {
        let deployment = match self.store.get_deployment(deployment_id).await {
            Ok(deployment) => deployment,
            Err(e) => {
                error!(deployment_id = %deployment_id, "Failed to load deployment: {}", e);
                return;
            }
        };
        if deployment.status.is_terminal() {
            return;
        }
        if let Err(e) = self
            .store
            .update_deployment(
                deployment_id,
                DeploymentUpdate::status(DeploymentStatus::Failed),
            )
            .await
        {
            error!(deployment_id = %deployment_id, "Failed to mark deployment failed: {}", e);
        }
    }
}
