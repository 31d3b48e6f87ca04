//! Local record store: in-memory tables with an optional JSON snapshot

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::errors::StoreError;
use crate::filesys::file::File;
use crate::models::{
    Build, BuildId, BuildStatus, Deployment, DeploymentId, DeploymentStatus, Hostname, HostnameId,
    NewDeployment, NewProject, Project, ProjectId,
};
use crate::store::{DeploymentUpdate, RecordStore};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Tables {
    next_id: u64,
    projects: BTreeMap<u64, Project>,
    deployments: BTreeMap<u64, Deployment>,
    builds: BTreeMap<u64, Build>,
    hostnames: BTreeMap<u64, Hostname>,
}

impl Tables {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn project(&self, id: ProjectId) -> Result<&Project, StoreError> {
        self.projects
            .get(&id.0)
            .ok_or_else(|| StoreError::not_found("project", id))
    }

    fn deployment_mut(&mut self, id: DeploymentId) -> Result<&mut Deployment, StoreError> {
        self.deployments
            .get_mut(&id.0)
            .ok_or_else(|| StoreError::not_found("deployment", id))
    }

    fn check_project_unique(&self, candidate: &Project) -> Result<(), StoreError> {
        for other in self.projects.values().filter(|p| p.id != candidate.id) {
            if other.slug == candidate.slug {
                return Err(StoreError::conflict(
                    "project",
                    format!("slug '{}' already used by project {}", candidate.slug, other.id),
                ));
            }
            if other.repo.owner == candidate.repo.owner && other.repo.name == candidate.repo.name {
                return Err(StoreError::conflict(
                    "project",
                    format!(
                        "repository {}/{} already bound to project {}",
                        candidate.repo.owner, candidate.repo.name, other.id
                    ),
                ));
            }
        }
        Ok(())
    }
}

/// Record store backed by in-memory tables.
///
/// Writes are serialized by one async lock. When opened with a snapshot file
/// a mutation is applied to a staged copy of the tables, the copy is written
/// to the snapshot and only then replaces the live tables. A failed write
/// leaves both the file and the in-memory state unchanged.
pub struct LocalStore {
    tables: Mutex<Tables>,
    snapshot: Option<File>,
}

impl LocalStore {
    /// Create an empty, non-persistent store
    pub fn in_memory() -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            snapshot: None,
        }
    }

    /// Open a store persisted to `snapshot`, loading it if present
    pub async fn open(snapshot: File) -> Result<Self, StoreError> {
        let tables = if snapshot.exists().await {
            let tables: Tables = snapshot
                .read_json()
                .await
                .map_err(|e| StoreError::Persist(e.to_string()))?;
            info!(
                "Loaded record store from {} ({} projects, {} deployments)",
                snapshot.path().display(),
                tables.projects.len(),
                tables.deployments.len()
            );
            tables
        } else {
            Tables::default()
        };

        Ok(Self {
            tables: Mutex::new(tables),
            snapshot: Some(snapshot),
        })
    }

    /// Apply `change` to the tables and persist the result atomically
    async fn commit<T, F>(&self, change: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Tables) -> Result<T, StoreError> + Send,
    {
        let mut tables = self.tables.lock().await;
        let Some(snapshot) = &self.snapshot else {
            return change(&mut tables);
        };

        let mut staged = tables.clone();
        let value = change(&mut staged)?;
        snapshot
            .write_json_atomic(&staged)
            .await
            .map_err(|e| StoreError::Persist(e.to_string()))?;
        debug!("Record store snapshot written");

        *tables = staged;
        Ok(value)
    }
}

#[async_trait]
impl RecordStore for LocalStore {
    async fn create_project(&self, new: NewProject) -> Result<Project, StoreError> {
        self.commit(|tables| {
            let now = Utc::now();
            let mut project = Project {
                id: ProjectId(0),
                owner_account: new.owner_account,
                name: new.name,
                slug: new.slug,
                repo: new.repo,
                branch: new.branch,
                env: new.env,
                created_at: now,
                updated_at: now,
            };
            tables.check_project_unique(&project)?;

            project.id = ProjectId(tables.allocate_id());
            tables.projects.insert(project.id.0, project.clone());
            Ok(project)
        })
        .await
    }

    async fn get_project(&self, id: ProjectId) -> Result<Project, StoreError> {
        let tables = self.tables.lock().await;
        tables.project(id).cloned()
    }

    async fn find_project_by_repo(
        &self,
        owner: &str,
        name: &str,
    ) -> Result<Option<Project>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .projects
            .values()
            .find(|p| p.repo.owner == owner && p.repo.name == name)
            .cloned())
    }

    async fn find_project_by_slug(&self, slug: &str) -> Result<Option<Project>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.projects.values().find(|p| p.slug == slug).cloned())
    }

    async fn update_project(&self, mut project: Project) -> Result<Project, StoreError> {
        self.commit(|tables| {
            let existing = tables.project(project.id)?;
            project.created_at = existing.created_at;
            project.updated_at = Utc::now();
            tables.check_project_unique(&project)?;

            tables.projects.insert(project.id.0, project.clone());
            Ok(project)
        })
        .await
    }

    async fn list_projects(&self) -> Result<Vec<Project>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.projects.values().cloned().collect())
    }

    async fn create_deployment(&self, new: NewDeployment) -> Result<Deployment, StoreError> {
        self.commit(|tables| {
            tables.project(new.project_id)?;

            let now = Utc::now();
            let deployment = Deployment {
                id: DeploymentId(tables.allocate_id()),
                project_id: new.project_id,
                status: DeploymentStatus::Pending,
                commit_sha: new.commit_sha,
                commit_message: new.commit_message,
                branch: new.branch,
                hostname: None,
                image_ref: None,
                workload_name: None,
                created_at: now,
                updated_at: now,
            };
            tables.deployments.insert(deployment.id.0, deployment.clone());
            Ok(deployment)
        })
        .await
    }

    async fn get_deployment(&self, id: DeploymentId) -> Result<Deployment, StoreError> {
        let tables = self.tables.lock().await;
        tables
            .deployments
            .get(&id.0)
            .cloned()
            .ok_or_else(|| StoreError::not_found("deployment", id))
    }

    async fn list_deployments(
        &self,
        project_id: ProjectId,
    ) -> Result<Vec<Deployment>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .deployments
            .values()
            .filter(|d| d.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn update_deployment(
        &self,
        id: DeploymentId,
        update: DeploymentUpdate,
    ) -> Result<Deployment, StoreError> {
        self.commit(|tables| {
            let deployment = tables.deployment_mut(id)?;

            if let Some(next) = update.status {
                if !deployment.status.can_transition_to(next) {
                    return Err(StoreError::InvalidTransition {
                        from: deployment.status,
                        to: next,
                    });
                }
                deployment.status = next;
            }
            if let Some(hostname) = update.hostname {
                deployment.hostname = Some(hostname);
            }
            if let Some(image_ref) = update.image_ref {
                deployment.image_ref = Some(image_ref);
            }
            if let Some(workload_name) = update.workload_name {
                deployment.workload_name = Some(workload_name);
            }
            deployment.updated_at = Utc::now();
            Ok(deployment.clone())
        })
        .await
    }

    async fn create_build(&self, deployment_id: DeploymentId) -> Result<Build, StoreError> {
        self.commit(|tables| {
            tables.deployment_mut(deployment_id)?;
            if tables
                .builds
                .values()
                .any(|b| b.deployment_id == deployment_id)
            {
                return Err(StoreError::conflict(
                    "build",
                    format!("deployment {} already has a build", deployment_id),
                ));
            }

            let build = Build {
                id: BuildId(tables.allocate_id()),
                deployment_id,
                status: BuildStatus::Building,
                logs: String::new(),
                started_at: Utc::now(),
                completed_at: None,
            };
            tables.builds.insert(build.id.0, build.clone());
            Ok(build)
        })
        .await
    }

    async fn find_build(&self, deployment_id: DeploymentId) -> Result<Option<Build>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .builds
            .values()
            .find(|b| b.deployment_id == deployment_id)
            .cloned())
    }

    async fn finish_build(
        &self,
        id: BuildId,
        status: BuildStatus,
        logs: String,
    ) -> Result<Build, StoreError> {
        self.commit(|tables| {
            let build = tables
                .builds
                .get_mut(&id.0)
                .ok_or_else(|| StoreError::not_found("build", id))?;
            build.status = status;
            build.logs = logs;
            build.completed_at = Some(Utc::now());
            Ok(build.clone())
        })
        .await
    }

    async fn create_hostname(
        &self,
        hostname: &str,
        project_id: ProjectId,
        deployment_id: DeploymentId,
    ) -> Result<Hostname, StoreError> {
        self.commit(|tables| {
            tables.project(project_id)?;
            tables.deployment_mut(deployment_id)?;
            if let Some(taken) = tables.hostnames.values().find(|h| h.hostname == hostname) {
                return Err(StoreError::conflict(
                    "hostname",
                    format!("'{}' already owned by project {}", hostname, taken.project_id),
                ));
            }

            let now = Utc::now();
            let record = Hostname {
                id: HostnameId(tables.allocate_id()),
                hostname: hostname.to_string(),
                project_id,
                deployment_id,
                is_active: true,
                created_at: now,
                updated_at: now,
            };
            tables.hostnames.insert(record.id.0, record.clone());
            Ok(record)
        })
        .await
    }

    async fn find_hostname(&self, hostname: &str) -> Result<Option<Hostname>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .hostnames
            .values()
            .find(|h| h.hostname == hostname)
            .cloned())
    }

    async fn find_active_hostname(
        &self,
        project_id: ProjectId,
    ) -> Result<Option<Hostname>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .hostnames
            .values()
            .find(|h| h.project_id == project_id && h.is_active)
            .cloned())
    }

    async fn point_hostname(
        &self,
        id: HostnameId,
        deployment_id: DeploymentId,
    ) -> Result<Hostname, StoreError> {
        self.commit(|tables| {
            tables.deployment_mut(deployment_id)?;
            let record = tables
                .hostnames
                .get_mut(&id.0)
                .ok_or_else(|| StoreError::not_found("hostname", id))?;
            record.deployment_id = deployment_id;
            record.is_active = true;
            record.updated_at = Utc::now();
            Ok(record.clone())
        })
        .await
    }

    async fn deactivate_hostnames(
        &self,
        project_id: ProjectId,
        keep: Option<HostnameId>,
    ) -> Result<usize, StoreError> {
        self.commit(|tables| {
            let now = Utc::now();
            let mut count = 0;
            for record in tables.hostnames.values_mut() {
                if record.project_id == project_id && record.is_active && Some(record.id) != keep {
                    record.is_active = false;
                    record.updated_at = now;
                    count += 1;
                }
            }
            Ok(count)
        })
        .await
    }

    async fn list_hostnames(&self, project_id: ProjectId) -> Result<Vec<Hostname>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .hostnames
            .values()
            .filter(|h| h.project_id == project_id)
            .cloned()
            .collect())
    }
}
