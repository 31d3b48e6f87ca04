//! Application configuration options

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::deploy::pipeline::PipelineOptions;
use crate::hostname::HostnameOptions;
use crate::ingest::Registration;
use crate::publish::PublishOptions;
use crate::storage::layout::StorageLayout;
use crate::storage::settings::Settings;
use crate::workers::pool;

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Storage layout
    pub storage: StorageLayout,

    /// Webhook server configuration
    pub server: ServerOptions,

    /// Webhook HMAC secret
    pub webhook_secret: SecretString,

    /// Hostname allocation
    pub hostname: HostnameOptions,

    /// Build pipeline
    pub pipeline: PipelineOptions,

    /// Worker pool
    pub pool: pool::Options,

    /// Publish built images to the cluster
    pub enable_publishing: bool,

    /// Kubeconfig path; inferred when `None`
    pub kubeconfig: Option<PathBuf>,

    /// Workload publishing
    pub publish: PublishOptions,

    /// Ignore pushes to branches other than the project's target branch
    pub only_target_branch: bool,

    /// Repositories registered at startup
    pub projects: Vec<Registration>,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            lifecycle: LifecycleOptions::default(),
            storage: StorageLayout::default(),
            server: ServerOptions::default(),
            webhook_secret: SecretString::from(String::new()),
            hostname: HostnameOptions::default(),
            pipeline: PipelineOptions::default(),
            pool: pool::Options::default(),
            enable_publishing: true,
            kubeconfig: None,
            publish: PublishOptions::default(),
            only_target_branch: false,
            projects: Vec::new(),
        }
    }
}

impl AppOptions {
    /// Options described by a settings file
    pub fn from_settings(settings: &Settings, storage: StorageLayout) -> Self {
        Self {
            lifecycle: LifecycleOptions::default(),
            storage,
            server: ServerOptions {
                host: settings.server.host.clone(),
                port: settings.server.port,
            },
            webhook_secret: settings.webhook_secret.clone(),
            hostname: HostnameOptions {
                base_domain: settings.base_domain.clone(),
                public_scheme: settings.public_scheme.clone(),
                max_probe: settings.hostname_max_probe,
            },
            pipeline: PipelineOptions {
                workspace_dir: settings.workspace_dir.clone(),
                keep_workspace: settings.keep_workspace,
                registry: settings.image_registry.clone(),
            },
            pool: pool::Options {
                workers: settings.workers,
            },
            enable_publishing: settings.publishing.enabled,
            kubeconfig: settings.publishing.kubeconfig.clone(),
            publish: PublishOptions {
                namespace: settings.publishing.namespace.clone(),
                ingress_class: settings.publishing.ingress_class.clone(),
                default_env: settings.publishing.default_env.clone(),
                ..Default::default()
            },
            only_target_branch: settings.only_target_branch,
            projects: settings.projects.clone(),
        }
    }
}

/// Lifecycle options for the controller
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}

/// Webhook server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}
