//! Deployment records

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DeploymentId, ProjectId};

/// Deployment lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    /// Ingested, waiting in the queue
    Pending,

    /// A worker is fetching and building the source
    Building,

    /// Image built, publishing the workload
    Deploying,

    /// Reachable at the project's hostname
    Deployed,

    /// Terminal failure
    Failed,
}

impl DeploymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentStatus::Pending => "pending",
            DeploymentStatus::Building => "building",
            DeploymentStatus::Deploying => "deploying",
            DeploymentStatus::Deployed => "deployed",
            DeploymentStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DeploymentStatus::Deployed | DeploymentStatus::Failed)
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One build-and-publish attempt for a project at a commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    pub id: DeploymentId,
    pub project_id: ProjectId,
    pub status: DeploymentStatus,
    pub commit_sha: String,
    pub commit_message: String,
    pub branch: String,

    /// The project's stable hostname, once published
    pub hostname: Option<String>,

    /// Built image reference
    pub image_ref: Option<String>,

    /// Name of the workload the image was published to
    pub workload_name: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Deployment {
    /// Commit prefix used in image tags
    pub fn short_commit(&self) -> &str {
        let end = self
            .commit_sha
            .char_indices()
            .nth(7)
            .map(|(i, _)| i)
            .unwrap_or(self.commit_sha.len());
        &self.commit_sha[..end]
    }
}

/// Fields for creating a pending deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDeployment {
    pub project_id: ProjectId,
    pub commit_sha: String,
    pub commit_message: String,
    pub branch: String,
}
