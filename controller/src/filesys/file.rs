//! File operations

use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::errors::ControllerError;

/// A file wrapper with path
#[derive(Debug, Clone)]
pub struct File {
    path: PathBuf,
}

impl File {
    /// Create a new file reference
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the file exists
    pub async fn exists(&self) -> bool {
        fs::metadata(&self.path).await.is_ok()
    }

    /// Read file contents as string
    pub async fn read_string(&self) -> Result<String, ControllerError> {
        Ok(fs::read_to_string(&self.path).await?)
    }

    /// Read file as JSON
    pub async fn read_json<T: DeserializeOwned>(&self) -> Result<T, ControllerError> {
        let contents = self.read_string().await?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Write string to file, creating parent directories
    pub async fn write_string(&self, contents: &str) -> Result<(), ControllerError> {
        self.create_parent().await?;
        fs::write(&self.path, contents).await?;
        Ok(())
    }

    /// Write pretty JSON through a temporary file and rename
    pub async fn write_json_atomic<T: Serialize>(&self, value: &T) -> Result<(), ControllerError> {
        let contents = serde_json::to_vec_pretty(value)?;
        self.create_parent().await?;

        let temp_path = self.path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(&contents).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }

    async fn create_parent(&self) -> Result<(), ControllerError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        Ok(())
    }
}
