//! Record store
//!
//! The controller only talks to persistence through [`RecordStore`]. Every
//! implementation must enforce the uniqueness constraints on project slugs,
//! repository coordinates and hostname strings, and must route deployment
//! status changes through the lifecycle state machine.

pub mod local;

use async_trait::async_trait;

use crate::errors::StoreError;
use crate::models::{
    Build, BuildId, BuildStatus, Deployment, DeploymentId, DeploymentStatus, Hostname, HostnameId,
    NewDeployment, NewProject, Project, ProjectId,
};

pub use local::LocalStore;

/// Partial update of a deployment, applied atomically
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploymentUpdate {
    pub status: Option<DeploymentStatus>,
    pub hostname: Option<String>,
    pub image_ref: Option<String>,
    pub workload_name: Option<String>,
}

impl DeploymentUpdate {
    pub fn status(status: DeploymentStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    // Projects

    async fn create_project(&self, new: NewProject) -> Result<Project, StoreError>;

    async fn get_project(&self, id: ProjectId) -> Result<Project, StoreError>;

    async fn find_project_by_repo(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<Option<Project>, StoreError>;

    async fn find_project_by_slug(&self, slug: &str) -> Result<Option<Project>, StoreError>;

    /// Replace a project's mutable fields
    async fn update_project(&self, project: Project) -> Result<Project, StoreError>;

    async fn list_projects(&self) -> Result<Vec<Project>, StoreError>;

    // Deployments

    /// Create a deployment in `pending` state
    async fn create_deployment(&self, new: NewDeployment) -> Result<Deployment, StoreError>;

    async fn get_deployment(&self, id: DeploymentId) -> Result<Deployment, StoreError>;

    async fn list_deployments(&self, project_id: ProjectId)
        -> Result<Vec<Deployment>, StoreError>;

    /// Apply an update; a status change must be a legal lifecycle transition
    async fn update_deployment(
        &self,
        id: DeploymentId,
        update: DeploymentUpdate,
    ) -> Result<Deployment, StoreError>;

    // Builds

    /// Create the build record of a deployment (status `building`)
    async fn create_build(&self, deployment_id: DeploymentId) -> Result<Build, StoreError>;

    async fn find_build(&self, deployment_id: DeploymentId) -> Result<Option<Build>, StoreError>;

    /// Record a terminal build status, its log and completion time
    async fn finish_build(
        &self,
        id: BuildId,
        status: BuildStatus,
        logs: String,
    ) -> Result<Build, StoreError>;

    // Hostnames

    /// Insert an active hostname row; conflicts if the string is taken
    async fn create_hostname(
        &self,
        hostname: &str,
        project_id: ProjectId,
        deployment_id: DeploymentId,
    ) -> Result<Hostname, StoreError>;

    async fn find_hostname(&self, hostname: &str) -> Result<Option<Hostname>, StoreError>;

    async fn find_active_hostname(
        &self,
        project_id: ProjectId,
    ) -> Result<Option<Hostname>, StoreError>;

    /// Point a hostname row at a deployment and mark it active
    async fn point_hostname(
        &self,
        id: HostnameId,
        deployment_id: DeploymentId,
    ) -> Result<Hostname, StoreError>;

    /// Deactivate every active row of a project except `keep`
    async fn deactivate_hostnames(
        &self,
        project_id: ProjectId,
        keep: Option<HostnameId>,
    ) -> Result<usize, StoreError>;

    async fn list_hostnames(&self, project_id: ProjectId) -> Result<Vec<Hostname>, StoreError>;
}
