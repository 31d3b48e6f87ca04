//! Docker image builder

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::errors::ControllerError;

/// Builds a container image from a source tree
#[async_trait]
pub trait ImageBuilder: Send + Sync {
    /// Build `source_dir` with `recipe` into `tag` and return the builder
    /// output
    async fn build(
        &self,
        source_dir: &Path,
        tag: &str,
        recipe: &Path,
    ) -> Result<String, ControllerError>;
}

/// [`ImageBuilder`] shelling out to the `docker` binary
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: String,
    push: bool,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self {
            program: "docker".to_string(),
            push: false,
        }
    }
}

impl DockerCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            push: false,
        }
    }

    /// Push every built image (tags carry the registry prefix)
    pub fn with_push(mut self, push: bool) -> Self {
        self.push = push;
        self
    }

    async fn run(&self, args: &[&str], log: &mut String) -> Result<(), ControllerError> {
        debug!("Running {} {}", self.program, args.join(" "));
        let output = Command::new(&self.program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                ControllerError::BuildError(format!("Failed to run {}: {}", self.program, e))
            })?;

        log.push_str(&String::from_utf8_lossy(&output.stdout));
        log.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            return Err(ControllerError::BuildError(format!(
                "{} {} failed ({}): {}",
                self.program,
                args.first().copied().unwrap_or_default(),
                output.status,
                log.trim()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ImageBuilder for DockerCli {
    async fn build(
        &self,
        source_dir: &Path,
        tag: &str,
        recipe: &Path,
    ) -> Result<String, ControllerError> {
        info!("Building image {} from {}", tag, source_dir.display());

        let source = source_dir.to_string_lossy();
        let recipe = recipe.to_string_lossy();
        let mut log = String::new();
        self.run(&["build", "-t", tag, "-f", &*recipe, &*source], &mut log)
            .await?;

        if self.push {
            info!("Pushing image {}", tag);
            self.run(&["push", tag], &mut log).await?;
        }

        info!("Successfully built image {}", tag);
        Ok(log)
    }
}
