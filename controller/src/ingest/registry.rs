//! Project registration

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::StoreError;
use crate::hostname::sanitize_label;
use crate::models::{NewProject, Project, RepoCoordinates};
use crate::store::RecordStore;

const MAX_SLUG_SUFFIX: u32 = 1_000;

/// Request to bind a repository to a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub owner_account: String,
    pub name: String,
    pub repo: RepoCoordinates,
    /// Target branch; `main` when absent
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

pub struct ProjectRegistry {
    store: Arc<dyn RecordStore>,
}

impl ProjectRegistry {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Register a repository.
    ///
    /// A repository that already has a project is re-linked to the
    /// requesting account instead of creating a second project.
    pub async fn register(&self, registration: Registration) -> Result<Project, StoreError> {
        if let Some(mut project) = self
            .store
            .find_project_by_repo(&registration.repo.owner, &registration.repo.name)
            .await?
        {
            if project.owner_account == registration.owner_account {
                return Ok(project);
            }
            info!(
                "Re-linking project {} from {} to {}",
                project.slug, project.owner_account, registration.owner_account
            );
            project.owner_account = registration.owner_account;
            return self.store.update_project(project).await;
        }

        let base = [&registration.name, &registration.repo.name]
            .into_iter()
            .map(|s| sanitize_label(s))
            .find(|s| !s.is_empty())
            .unwrap_or_else(|| "project".to_string());

        for attempt in 0..=MAX_SLUG_SUFFIX {
            let slug = if attempt == 0 {
                base.clone()
            } else {
                format!("{}-{}", base, attempt)
            };
            if self.store.find_project_by_slug(&slug).await?.is_some() {
                continue;
            }

            let new = NewProject {
                owner_account: registration.owner_account.clone(),
                name: registration.name.clone(),
                slug,
                repo: registration.repo.clone(),
                branch: registration
                    .branch
                    .clone()
                    .filter(|b| !b.is_empty())
                    .unwrap_or_else(|| "main".to_string()),
                env: registration.env.clone(),
            };
            match self.store.create_project(new).await {
                Ok(project) => {
                    info!(
                        "Registered project {} for {}/{}",
                        project.slug, project.repo.owner, project.repo.name
                    );
                    return Ok(project);
                }
                Err(StoreError::Conflict { .. }) => {
                    // raced with another registration of the same repository
                    if let Some(project) = self
                        .store
                        .find_project_by_repo(&registration.repo.owner, &registration.repo.name)
                        .await?
                    {
                        return Ok(project);
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Err(StoreError::conflict(
            "project",
            format!("no free slug for '{}'", base),
        ))
    }
}
