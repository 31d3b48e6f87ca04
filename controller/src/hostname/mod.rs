//! Hostname allocation
//!
//! Every project owns exactly one stable external hostname. The first
//! successful publish derives it from the project slug and the configured
//! base domain; every later publish reuses the same row and only moves its
//! deployment pointer.

pub mod locks;

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::errors::{HostnameError, StoreError};
use crate::models::{DeploymentId, Hostname, Project, ProjectId};
use crate::store::{DeploymentUpdate, RecordStore};

pub use locks::ProjectLocks;

/// Default cap on collision suffixes
pub const DEFAULT_MAX_PROBE: u32 = 10_000;

/// Hostname allocator options
#[derive(Debug, Clone)]
pub struct HostnameOptions {
    /// Domain appended to every project label
    pub base_domain: String,

    /// Scheme used when building public URLs
    pub public_scheme: String,

    /// Maximum numeric suffix tried on collisions
    pub max_probe: u32,
}

impl Default for HostnameOptions {
    fn default() -> Self {
        Self {
            base_domain: "localhost".to_string(),
            public_scheme: "http".to_string(),
            max_probe: DEFAULT_MAX_PROBE,
        }
    }
}

/// Fold a slug into a DNS label.
///
/// Lower-cases ASCII letters, keeps ASCII digits and `-`, turns spaces,
/// underscores, dots and slashes into `-` and drops everything else.
pub fn sanitize_label(input: &str) -> String {
    let mut label = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            'a'..='z' | '0'..='9' | '-' => label.push(c),
            'A'..='Z' => label.push(c.to_ascii_lowercase()),
            ' ' | '_' | '.' | '/' => label.push('-'),
            _ => {}
        }
    }
    label
}

/// Label for a project: slug, then name, then repository name
fn project_label(project: &Project) -> String {
    [&project.slug, &project.name, &project.repo.name]
        .into_iter()
        .map(|s| sanitize_label(s))
        .find(|s| !s.is_empty())
        .unwrap_or_else(|| "deploy".to_string())
}

/// Assigns and reuses one stable hostname per project
pub struct HostnameAllocator {
    store: Arc<dyn RecordStore>,
    options: HostnameOptions,
}

impl HostnameAllocator {
    pub fn new(store: Arc<dyn RecordStore>, options: HostnameOptions) -> Self {
        Self { store, options }
    }

    pub fn options(&self) -> &HostnameOptions {
        &self.options
    }

    /// Candidate hostname for a label and probe index
    pub fn candidate(&self, label: &str, attempt: u32) -> String {
        if attempt == 0 {
            format!("{}.{}", label, self.options.base_domain)
        } else {
            format!("{}-{}.{}", label, attempt, self.options.base_domain)
        }
    }

    /// Full accessible URL for a hostname
    pub fn full_url(&self, hostname: &str) -> String {
        if hostname.is_empty() {
            return String::new();
        }
        format!("{}://{}", self.options.public_scheme, hostname)
    }

    /// Allocate the project's hostname for a deployment.
    ///
    /// Returns the existing active hostname when the project has one,
    /// otherwise probes `label`, `label-1`, `label-2`, ... until a free
    /// hostname is found. The hostname is written onto the deployment.
    pub async fn allocate(
        &self,
        project_id: ProjectId,
        deployment_id: DeploymentId,
    ) -> Result<String, HostnameError> {
        let project = self.store.get_project(project_id).await?;
        let deployment = self.store.get_deployment(deployment_id).await?;
        if deployment.project_id != project_id {
            return Err(StoreError::conflict(
                "deployment",
                format!(
                    "deployment {} belongs to project {}, not {}",
                    deployment_id, deployment.project_id, project_id
                ),
            )
            .into());
        }

        if let Some(active) = self.store.find_active_hostname(project_id).await? {
            debug!(
                "Reusing hostname {} for project {}",
                active.hostname, project_id
            );
            return self.bind(active, deployment_id).await;
        }

        let label = project_label(&project);
        for attempt in 0..=self.options.max_probe {
            let candidate = self.candidate(&label, attempt);

            match self.store.find_hostname(&candidate).await? {
                Some(existing) if existing.project_id == project_id => {
                    info!(
                        "Reactivating hostname {} for project {}",
                        candidate, project_id
                    );
                    return self.bind(existing, deployment_id).await;
                }
                Some(_) => continue,
                None => {}
            }

            match self
                .store
                .create_hostname(&candidate, project_id, deployment_id)
                .await
            {
                Ok(record) => {
                    info!(
                        "Allocated hostname {} for project {}",
                        record.hostname, project_id
                    );
                    return self.bind(record, deployment_id).await;
                }
                Err(StoreError::Conflict { .. }) => {
                    debug!("Hostname {} taken concurrently, probing on", candidate);
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!(
            "Hostname allocation exhausted for project {} (label '{}')",
            project_id, label
        );
        Err(HostnameError::Exhausted {
            label,
            attempts: self.options.max_probe + 1,
        })
    }

    /// Make `record` the project's only active row, point it at the
    /// deployment and copy the hostname onto the deployment
    async fn bind(
        &self,
        record: Hostname,
        deployment_id: DeploymentId,
    ) -> Result<String, HostnameError> {
        let deactivated = self
            .store
            .deactivate_hostnames(record.project_id, Some(record.id))
            .await?;
        if deactivated > 0 {
            warn!(
                "Deactivated {} stray hostname rows of project {}",
                deactivated, record.project_id
            );
        }

        let record = self.store.point_hostname(record.id, deployment_id).await?;
        self.store
            .update_deployment(
                deployment_id,
                DeploymentUpdate {
                    hostname: Some(record.hostname.clone()),
                    ..Default::default()
                },
            )
            .await?;

        Ok(record.hostname)
    }
}
