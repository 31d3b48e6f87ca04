//! Storage layout configuration

use std::path::PathBuf;

use crate::errors::ControllerError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;

/// On-disk layout of the controller's state
#[derive(Debug, Clone)]
pub struct StorageLayout {
    /// Base directory for all storage
    pub base_dir: PathBuf,
}

impl StorageLayout {
    /// Create a new storage layout
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Get the settings file path
    pub fn settings_file(&self) -> File {
        File::new(self.base_dir.join("settings.json"))
    }

    /// Get the record store snapshot path
    pub fn store_file(&self) -> File {
        File::new(self.base_dir.join("store.json"))
    }

    /// Create the base directory
    pub async fn setup(&self) -> Result<(), ControllerError> {
        Dir::new(&self.base_dir).create().await
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        #[cfg(target_os = "linux")]
        let base_dir = PathBuf::from("/var/lib/launchpad");

        #[cfg(not(target_os = "linux"))]
        let base_dir = std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".launchpad");

        Self::new(base_dir)
    }
}
