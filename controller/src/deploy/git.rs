//! Git source fetcher

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::errors::ControllerError;

/// Fetches a repository branch into a local directory
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Shallow single-branch fetch of `branch` into `target_dir`
    async fn fetch(&self, repo_url: &str, target_dir: &Path, branch: &str)
        -> Result<(), ControllerError>;

    /// Commit checked out in `dir`, if it can be determined
    async fn head_commit(&self, dir: &Path) -> Option<String>;
}

/// [`SourceFetcher`] shelling out to the `git` binary
#[derive(Debug, Clone)]
pub struct GitCli {
    program: String,
}

impl Default for GitCli {
    fn default() -> Self {
        Self {
            program: "git".to_string(),
        }
    }
}

impl GitCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl SourceFetcher for GitCli {
    async fn fetch(
        &self,
        repo_url: &str,
        target_dir: &Path,
        branch: &str,
    ) -> Result<(), ControllerError> {
        info!(
            "Cloning {} (branch: {}) to {}",
            repo_url,
            branch,
            target_dir.display()
        );

        // a leftover workspace from an earlier attempt would make clone fail
        if target_dir.exists() {
            debug!("Removing stale workspace {}", target_dir.display());
            tokio::fs::remove_dir_all(target_dir).await?;
        }
        if let Some(parent) = target_dir.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let output = Command::new(&self.program)
            .args(["clone", "--depth", "1", "--single-branch", "--branch", branch, repo_url])
            .arg(target_dir)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ControllerError::FetchError(format!("Failed to run git clone: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ControllerError::FetchError(format!(
                "git clone failed: {}",
                stderr.trim()
            )));
        }

        debug!("Cloned {} into {}", repo_url, target_dir.display());
        Ok(())
    }

    async fn head_commit(&self, dir: &Path) -> Option<String> {
        let output = Command::new(&self.program)
            .current_dir(dir)
            .args(["rev-parse", "HEAD"])
            .kill_on_drop(true)
            .output()
            .await
            .ok()?;
        if !output.status.success() {
            return None;
        }
        let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
        (!sha.is_empty()).then_some(sha)
    }
}
