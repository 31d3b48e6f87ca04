//! Error types for the deployment controller

use thiserror::Error;

use crate::models::DeploymentStatus;

/// Record store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("{entity} conflict: {detail}")]
    Conflict { entity: &'static str, detail: String },

    #[error("Invalid deployment transition: {from} -> {to}")]
    InvalidTransition {
        from: DeploymentStatus,
        to: DeploymentStatus,
    },

    #[error("Persist error: {0}")]
    Persist(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub fn conflict(entity: &'static str, detail: impl Into<String>) -> Self {
        StoreError::Conflict {
            entity,
            detail: detail.into(),
        }
    }
}

/// Build queue errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("Dequeue cancelled")]
    Cancelled,
}

/// Hostname allocation errors
#[derive(Error, Debug)]
pub enum HostnameError {
    #[error("Hostname allocation exhausted for '{label}' after {attempts} candidates")]
    Exhausted { label: String, attempts: u32 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors returned by a publish target for a single resource operation
#[derive(Error, Debug)]
pub enum TargetError {
    #[error("{kind} '{name}' already exists")]
    AlreadyExists { kind: &'static str, name: String },

    #[error("{kind} '{name}': {message}")]
    Api {
        kind: &'static str,
        name: String,
        message: String,
    },
}

/// Workload publish errors
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Failed to create or update {kind}: {source}")]
    Resource {
        kind: &'static str,
        #[source]
        source: TargetError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Ingestion errors (rejected before reaching the core)
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Malformed event: {0}")]
    Malformed(String),

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Project not found for repository {owner}/{name}")]
    ProjectNotFound { owner: String, name: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Main error type for the controller
#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),

    #[error("Queue error: {0}")]
    QueueError(#[from] QueueError),

    #[error("Hostname error: {0}")]
    HostnameError(#[from] HostnameError),

    #[error("Publish error: {0}")]
    PublishError(#[from] PublishError),

    #[error("Ingest error: {0}")]
    IngestError(#[from] IngestError),

    #[error("Source fetch error: {0}")]
    FetchError(String),

    #[error("Recipe error: {0}")]
    RecipeError(String),

    #[error("Image build error: {0}")]
    BuildError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for ControllerError {
    fn from(err: anyhow::Error) -> Self {
        ControllerError::Internal(err.to_string())
    }
}
