//! Directory operations

use std::path::{Path, PathBuf};

use tokio::fs;

use crate::errors::ControllerError;

/// A directory wrapper with path
#[derive(Debug, Clone)]
pub struct Dir {
    path: PathBuf,
}

impl Dir {
    /// Create a new directory reference
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the directory path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the directory exists
    pub async fn exists(&self) -> bool {
        fs::metadata(&self.path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    /// Create the directory (and parents)
    pub async fn create(&self) -> Result<(), ControllerError> {
        fs::create_dir_all(&self.path).await?;
        Ok(())
    }

    /// Delete the directory and all contents
    pub async fn delete(&self) -> Result<(), ControllerError> {
        if self.exists().await {
            fs::remove_dir_all(&self.path).await?;
        }
        Ok(())
    }
}
