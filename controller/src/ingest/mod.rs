//! Ingestion entrypoint
//!
//! Turns a verified push event into a pending deployment and hands its id
//! to the build queue.

pub mod events;
pub mod registry;
pub mod signature;

use std::sync::Arc;

use tracing::{error, info};

use crate::errors::IngestError;
use crate::models::{Deployment, DeploymentStatus, NewDeployment};
use crate::queue::BuildQueue;
use crate::store::{DeploymentUpdate, RecordStore};

pub use events::{PushEvent, WebhookEvent};
pub use registry::{ProjectRegistry, Registration};

/// Result of ingesting a push
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Deployment created and enqueued
    Queued(Deployment),

    /// Deployment created but no queue to take it; marked failed
    Unqueued(Deployment),

    /// Push accepted but not deployed
    Ignored(String),
}

pub struct Ingestor {
    store: Arc<dyn RecordStore>,
    queue: Option<Arc<BuildQueue>>,

    /// Only deploy pushes to the project's target branch
    only_target_branch: bool,
}

impl Ingestor {
    pub fn new(store: Arc<dyn RecordStore>, queue: Option<Arc<BuildQueue>>) -> Self {
        Self {
            store,
            queue,
            only_target_branch: false,
        }
    }

    /// Ignore pushes to branches other than the project's target branch.
    /// Off by default: every push to a registered repository is deployed.
    pub fn with_branch_filter(mut self, only_target_branch: bool) -> Self {
        self.only_target_branch = only_target_branch;
        self
    }

    /// Resolve the push to its project, create a pending deployment and
    /// enqueue it
    pub async fn ingest(&self, push: &PushEvent) -> Result<IngestOutcome, IngestError> {
        let project = self
            .store
            .find_project_by_repo(&push.repo_owner, &push.repo_name)
            .await?
            .ok_or_else(|| IngestError::ProjectNotFound {
                owner: push.repo_owner.clone(),
                name: push.repo_name.clone(),
            })?;

        if self.only_target_branch && !project.branch.is_empty() && project.branch != push.branch {
            info!(
                "Ignoring push to {} of {}/{} (project {} deploys {})",
                push.branch, push.repo_owner, push.repo_name, project.slug, project.branch
            );
            return Ok(IngestOutcome::Ignored(format!(
                "Branch {} is not deployed",
                push.branch
            )));
        }

        let deployment = self
            .store
            .create_deployment(NewDeployment {
                project_id: project.id,
                commit_sha: push.commit_sha.clone(),
                commit_message: push.commit_message.clone(),
                branch: push.branch.clone(),
            })
            .await?;

        match &self.queue {
            Some(queue) => {
                queue.enqueue(deployment.id);
                info!(
                    deployment_id = %deployment.id,
                    "Deployment enqueued for {} at {}",
                    project.slug,
                    deployment.short_commit()
                );
                Ok(IngestOutcome::Queued(deployment))
            }
            None => {
                error!(deployment_id = %deployment.id, "No build queue, marking deployment failed");
                let deployment = self
                    .store
                    .update_deployment(
                        deployment.id,
                        DeploymentUpdate::status(DeploymentStatus::Failed),
                    )
                    .await?;
                Ok(IngestOutcome::Unqueued(deployment))
            }
        }
    }
}
