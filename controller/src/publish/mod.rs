//! Workload publishing
//!
//! A workload is three resources sharing one name derived from the project:
//! a process group running the image, an internal endpoint in front of it
//! and an external route binding the project's hostname to the endpoint.
//! Successive deployments of a project update these in place.

pub mod cluster;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::errors::{PublishError, TargetError};
use crate::models::{Deployment, ProjectId};
use crate::store::{DeploymentUpdate, RecordStore};

pub use cluster::KubeTarget;

/// Compute resources of a workload container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLimits {
    pub cpu_request: String,
    pub memory_request: String,
    pub cpu_limit: String,
    pub memory_limit: String,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            cpu_request: "100m".to_string(),
            memory_request: "128Mi".to_string(),
            cpu_limit: "500m".to_string(),
            memory_limit: "512Mi".to_string(),
        }
    }
}

/// Everything a publish target needs to realise a workload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadSpec {
    pub name: String,
    pub namespace: String,
    pub image: String,
    pub host: String,
    pub container_port: u16,
    pub service_port: u16,
    pub replicas: i32,
    pub env: BTreeMap<String, String>,
    pub resources: ResourceLimits,
    pub ingress_class: Option<String>,
}

/// Cluster-facing side of publishing.
///
/// `create_*` must report an existing resource as
/// [`TargetError::AlreadyExists`]; `update_*` replaces it in place.
#[async_trait]
pub trait PublishTarget: Send + Sync {
    async fn create_process_group(&self, spec: &WorkloadSpec) -> Result<(), TargetError>;
    async fn update_process_group(&self, spec: &WorkloadSpec) -> Result<(), TargetError>;

    async fn create_endpoint(&self, spec: &WorkloadSpec) -> Result<(), TargetError>;
    async fn update_endpoint(&self, spec: &WorkloadSpec) -> Result<(), TargetError>;

    async fn create_route(&self, spec: &WorkloadSpec) -> Result<(), TargetError>;
    async fn update_route(&self, spec: &WorkloadSpec) -> Result<(), TargetError>;
}

/// Publisher options
#[derive(Debug, Clone)]
pub struct PublishOptions {
    pub namespace: String,
    pub container_port: u16,
    pub service_port: u16,
    pub replicas: i32,
    pub ingress_class: Option<String>,
    pub resources: ResourceLimits,

    /// Environment applied to every workload; project variables win
    pub default_env: BTreeMap<String, String>,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            container_port: 8080,
            service_port: 80,
            replicas: 1,
            ingress_class: None,
            resources: ResourceLimits::default(),
            default_env: BTreeMap::from([("PORT".to_string(), "8080".to_string())]),
        }
    }
}

/// Name of the workload serving a project
pub fn workload_name(project_id: ProjectId) -> String {
    format!("project-{}", project_id)
}

/// Makes a built image reachable at a project's hostname
pub struct WorkloadPublisher {
    store: Arc<dyn RecordStore>,
    target: Arc<dyn PublishTarget>,
    options: PublishOptions,
}

impl WorkloadPublisher {
    pub fn new(
        store: Arc<dyn RecordStore>,
        target: Arc<dyn PublishTarget>,
        options: PublishOptions,
    ) -> Self {
        Self {
            store,
            target,
            options,
        }
    }

    /// Build the workload spec for a deployment
    pub async fn workload_spec(
        &self,
        image_ref: &str,
        hostname: &str,
        deployment: &Deployment,
    ) -> Result<WorkloadSpec, PublishError> {
        let project = self.store.get_project(deployment.project_id).await?;

        let mut env = self.options.default_env.clone();
        env.extend(project.env);

        Ok(WorkloadSpec {
            name: workload_name(deployment.project_id),
            namespace: self.options.namespace.clone(),
            image: image_ref.to_string(),
            host: hostname.to_string(),
            container_port: self.options.container_port,
            service_port: self.options.service_port,
            replicas: self.options.replicas,
            env,
            resources: self.options.resources.clone(),
            ingress_class: self.options.ingress_class.clone(),
        })
    }

    /// Create or update the workload of a deployment's project.
    ///
    /// The three resources are not applied transactionally: when a later
    /// step fails, earlier ones stay applied and the error is returned.
    pub async fn publish(
        &self,
        image_ref: &str,
        hostname: &str,
        deployment: &Deployment,
    ) -> Result<(), PublishError> {
        let spec = self.workload_spec(image_ref, hostname, deployment).await?;
        info!(
            "Publishing {} as workload {} at {}",
            spec.image, spec.name, spec.host
        );

        let target = self.target.as_ref();
        apply(
            "process group",
            &spec,
            target.create_process_group(&spec),
            || target.update_process_group(&spec),
        )
        .await?;
        apply(
            "endpoint",
            &spec,
            target.create_endpoint(&spec),
            || target.update_endpoint(&spec),
        )
        .await?;
        apply(
            "route",
            &spec,
            target.create_route(&spec),
            || target.update_route(&spec),
        )
        .await?;

        self.store
            .update_deployment(
                deployment.id,
                DeploymentUpdate {
                    workload_name: Some(spec.name.clone()),
                    ..Default::default()
                },
            )
            .await?;

        info!("Workload {} published at {}", spec.name, spec.host);
        Ok(())
    }
}

/// Create a resource, falling back to update when it already exists
async fn apply<C, U, F>(
    kind: &'static str,
    spec: &WorkloadSpec,
    create: C,
    update: U,
) -> Result<(), PublishError>
where
    C: std::future::Future<Output = Result<(), TargetError>>,
    U: FnOnce() -> F,
    F: std::future::Future<Output = Result<(), TargetError>>,
{
    match create.await {
        Ok(()) => {
            debug!("Created {} {}", kind, spec.name);
            Ok(())
        }
        Err(TargetError::AlreadyExists { .. }) => {
            debug!("{} {} exists, updating in place", kind, spec.name);
            update()
                .await
                .map_err(|source| PublishError::Resource { kind, source })
        }
        Err(source) => Err(PublishError::Resource { kind, source }),
    }
}
