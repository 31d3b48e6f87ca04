//! Project records

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ProjectId;

/// Where a project's source lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoCoordinates {
    /// Repository owner login
    pub owner: String,

    /// Repository name
    pub name: String,

    /// Clone URL
    pub url: String,
}

/// A registered source repository bound to one deployable unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,

    /// Owning account reference
    pub owner_account: String,

    /// Human-readable name
    pub name: String,

    /// URL-safe slug, unique across projects
    pub slug: String,

    pub repo: RepoCoordinates,

    /// Branch whose pushes are deployed
    pub branch: String,

    /// Plain environment variables injected into the workload
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for creating a project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProject {
    pub owner_account: String,
    pub name: String,
    pub slug: String,
    pub repo: RepoCoordinates,
    pub branch: String,
    pub env: BTreeMap<String, String>,
}
