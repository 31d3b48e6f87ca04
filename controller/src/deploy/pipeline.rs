//! Build pipeline
//!
//! Runs one dequeued deployment from source fetch to published workload:
//! fetch, recipe, image build, then (when publishing is configured)
//! hostname allocation and publish under the project's lock.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::deploy::docker::ImageBuilder;
use crate::deploy::git::SourceFetcher;
use crate::deploy::recipe;
use crate::errors::ControllerError;
use crate::filesys::dir::Dir;
use crate::hostname::{HostnameAllocator, ProjectLocks};
use crate::models::{BuildStatus, Deployment, DeploymentId, DeploymentStatus, Project};
use crate::publish::WorkloadPublisher;
use crate::store::{DeploymentUpdate, RecordStore};

/// Default parent of the per-deployment checkouts
pub fn default_workspace_dir() -> PathBuf {
    std::env::temp_dir().join("builds")
}

/// Pipeline options
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Parent of the per-deployment source checkouts
    pub workspace_dir: PathBuf,

    /// Leave checkouts on disk after the pipeline finishes
    pub keep_workspace: bool,

    /// Registry prefix for image tags, e.g. `registry.example.com/apps`
    pub registry: Option<String>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            workspace_dir: default_workspace_dir(),
            keep_workspace: false,
            registry: None,
        }
    }
}

/// Components needed to publish a built image
#[derive(Clone)]
pub struct Publishing {
    pub allocator: Arc<HostnameAllocator>,
    pub publisher: Arc<WorkloadPublisher>,
    pub locks: Arc<ProjectLocks>,
}

/// Image tag for a deployment: `deploy-<id>:<short commit>`
pub fn image_tag(deployment: &Deployment, registry: Option<&str>) -> String {
    let tag = format!("deploy-{}:{}", deployment.id, deployment.short_commit());
    match registry.map(|r| r.trim_end_matches('/')) {
        Some(registry) if !registry.is_empty() => format!("{}/{}", registry, tag),
        _ => tag,
    }
}

pub struct BuildPipeline {
    store: Arc<dyn RecordStore>,
    fetcher: Arc<dyn SourceFetcher>,
    builder: Arc<dyn ImageBuilder>,
    publishing: Option<Publishing>,
    options: PipelineOptions,
}

impl BuildPipeline {
    pub fn new(
        store: Arc<dyn RecordStore>,
        fetcher: Arc<dyn SourceFetcher>,
        builder: Arc<dyn ImageBuilder>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            store,
            fetcher,
            builder,
            publishing: None,
            options,
        }
    }

    /// Publish built images; without this the pipeline stops at `deploying`
    pub fn with_publishing(mut self, publishing: Publishing) -> Self {
        self.publishing = Some(publishing);
        self
    }

    pub fn is_publishing(&self) -> bool {
        self.publishing.is_some()
    }

    /// Checkout directory of a deployment
    pub fn workspace(&self, deployment_id: DeploymentId) -> PathBuf {
        self.options.workspace_dir.join(deployment_id.to_string())
    }

    /// Run the pipeline for a deployment already marked `building`.
    ///
    /// On a build error the Build record is marked failed and the error is
    /// returned with the deployment untouched; on a publish error the
    /// deployment is marked failed here.
    pub async fn run(&self, deployment_id: DeploymentId) -> Result<Deployment, ControllerError> {
        let deployment = self.store.get_deployment(deployment_id).await?;
        let project = self.store.get_project(deployment.project_id).await?;
        let build = self.store.create_build(deployment_id).await?;
        let workspace = self.workspace(deployment_id);

        let mut log = String::new();
        let result = self
            .build_image(&project, &deployment, &workspace, &mut log)
            .await;
        self.cleanup(&workspace).await;

        let image_ref = match result {
            Ok(image_ref) => {
                self.store
                    .finish_build(build.id, BuildStatus::Success, log)
                    .await?;
                image_ref
            }
            Err(e) => {
                warn!(deployment_id = %deployment_id, "Build failed: {}", e);
                log.push_str(&e.to_string());
                self.store
                    .finish_build(build.id, BuildStatus::Failed, log)
                    .await?;
                return Err(e);
            }
        };

        let deployment = self
            .store
            .update_deployment(
                deployment_id,
                DeploymentUpdate {
                    status: Some(DeploymentStatus::Deploying),
                    image_ref: Some(image_ref.clone()),
                    ..Default::default()
                },
            )
            .await?;
        info!(deployment_id = %deployment_id, "Image {} built", image_ref);

        let Some(publishing) = &self.publishing else {
            debug!(deployment_id = %deployment_id, "Publishing disabled, stopping at deploying");
            return Ok(deployment);
        };

        match self.publish(publishing, &image_ref, &deployment).await {
            Ok(hostname) => {
                let deployment = self
                    .store
                    .update_deployment(
                        deployment_id,
                        DeploymentUpdate::status(DeploymentStatus::Deployed),
                    )
                    .await?;
                info!(
                    deployment_id = %deployment_id,
                    "Deployed at {}",
                    publishing.allocator.full_url(&hostname)
                );
                Ok(deployment)
            }
            Err(e) => {
                warn!(deployment_id = %deployment_id, "Publish failed: {}", e);
                self.store
                    .update_deployment(
                        deployment_id,
                        DeploymentUpdate::status(DeploymentStatus::Failed),
                    )
                    .await?;
                Err(e)
            }
        }
    }

    /// Fetch, resolve the recipe and build; returns the image reference
    async fn build_image(
        &self,
        project: &Project,
        deployment: &Deployment,
        workspace: &Path,
        log: &mut String,
    ) -> Result<String, ControllerError> {
        self.fetcher
            .fetch(&project.repo.url, workspace, &deployment.branch)
            .await?;

        if let Some(head) = self.fetcher.head_commit(workspace).await {
            if head != deployment.commit_sha {
                let line = format!(
                    "warning: fetched {} at {} but deployment is for {}\n",
                    deployment.branch, head, deployment.commit_sha
                );
                warn!(deployment_id = %deployment.id, "{}", line.trim_end());
                log.push_str(&line);
            }
        }

        let recipe = recipe::resolve(workspace).await?;
        let tag = image_tag(deployment, self.options.registry.as_deref());
        let output = self.builder.build(workspace, &tag, &recipe).await?;
        log.push_str(&output);
        Ok(tag)
    }

    async fn publish(
        &self,
        publishing: &Publishing,
        image_ref: &str,
        deployment: &Deployment,
    ) -> Result<String, ControllerError> {
        let _guard = publishing.locks.acquire(deployment.project_id).await;
        let hostname = publishing
            .allocator
            .allocate(deployment.project_id, deployment.id)
            .await?;
        publishing
            .publisher
            .publish(image_ref, &hostname, deployment)
            .await?;
        Ok(hostname)
    }

    async fn cleanup(&self, workspace: &Path) {
        if self.options.keep_workspace {
            return;
        }
        if let Err(e) = Dir::new(workspace).delete().await {
            warn!("Failed to remove workspace {}: {}", workspace.display(), e);
        }
    }
}
