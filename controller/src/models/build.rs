//! Build log records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BuildId, DeploymentId};

/// Build status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    Building,
    Success,
    Failed,
}

/// The image-build record underlying a deployment (1:1)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Build {
    pub id: BuildId,
    pub deployment_id: DeploymentId,
    pub status: BuildStatus,
    pub logs: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}
