//! Hostname allocation records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DeploymentId, HostnameId, ProjectId};

/// Durable external address of a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hostname {
    pub id: HostnameId,

    /// Globally unique hostname string
    pub hostname: String,

    pub project_id: ProjectId,

    /// Deployment currently served at this hostname
    pub deployment_id: DeploymentId,

    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
