//! Application state management

use std::sync::Arc;

use tracing::{info, warn};

use crate::app::options::AppOptions;
use crate::deploy::docker::ImageBuilder;
use crate::deploy::git::SourceFetcher;
use crate::deploy::pipeline::{BuildPipeline, Publishing};
use crate::hostname::{HostnameAllocator, ProjectLocks};
use crate::errors::ControllerError;
use crate::ingest::{Ingestor, ProjectRegistry, Registration};
use crate::publish::{PublishTarget, WorkloadPublisher};
use crate::queue::BuildQueue;
use crate::store::RecordStore;
use crate::workers::WorkerPool;

/// External collaborators of the pipeline
pub struct Collaborators {
    pub fetcher: Arc<dyn SourceFetcher>,
    pub builder: Arc<dyn ImageBuilder>,

    /// Cluster to publish to; builds stop at `deploying` without one
    pub target: Option<Arc<dyn PublishTarget>>,
}

/// Main application state
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub queue: Arc<BuildQueue>,
    pub pipeline: Arc<BuildPipeline>,
    pub pool: Arc<WorkerPool>,
    pub ingestor: Arc<Ingestor>,
    pub registry: Arc<ProjectRegistry>,
}

impl AppState {
    /// Wire every component; workers are not started
    pub fn new(
        options: &AppOptions,
        store: Arc<dyn RecordStore>,
        collaborators: Collaborators,
    ) -> Self {
        info!("Initializing application state...");

        let queue = Arc::new(BuildQueue::new());

        let mut pipeline = BuildPipeline::new(
            store.clone(),
            collaborators.fetcher,
            collaborators.builder,
            options.pipeline.clone(),
        );
        match collaborators.target {
            Some(target) => {
                pipeline = pipeline.with_publishing(Publishing {
                    allocator: Arc::new(HostnameAllocator::new(
                        store.clone(),
                        options.hostname.clone(),
                    )),
                    publisher: Arc::new(WorkloadPublisher::new(
                        store.clone(),
                        target,
                        options.publish.clone(),
                    )),
                    locks: Arc::new(ProjectLocks::new()),
                });
            }
            None => warn!("No publish target configured, images will be built but not published"),
        }
        let pipeline = Arc::new(pipeline);

        let pool = Arc::new(WorkerPool::new(
            options.pool.clone(),
            queue.clone(),
            store.clone(),
            pipeline.clone(),
        ));
        let ingestor = Arc::new(
            Ingestor::new(store.clone(), Some(queue.clone()))
                .with_branch_filter(options.only_target_branch),
        );
        let registry = Arc::new(ProjectRegistry::new(store.clone()));

        Self {
            store,
            queue,
            pipeline,
            pool,
            ingestor,
            registry,
        }
    }

    /// Bind each configured repository to a project, reusing existing ones
    pub async fn register_projects(
        &self,
        registrations: &[Registration],
    ) -> Result<(), ControllerError> {
        for registration in registrations {
            let project = self.registry.register(registration.clone()).await?;
            info!(
                "Project {} tracks {}/{} on {}",
                project.slug, project.repo.owner, project.repo.name, project.branch
            );
        }
        Ok(())
    }
}
