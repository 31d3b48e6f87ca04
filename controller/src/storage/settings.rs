//! Settings file management

use std::collections::BTreeMap;
use std::path::PathBuf;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::errors::ControllerError;
use crate::deploy::pipeline::default_workspace_dir;
use crate::filesys::file::File;
use crate::ingest::Registration;
use crate::hostname::DEFAULT_MAX_PROBE;
use crate::logs::LogLevel;
use crate::workers::pool::DEFAULT_WORKERS;

/// Controller settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit logs as JSON lines
    #[serde(default)]
    pub log_json: bool,

    /// Also write daily-rolling log files here
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Webhook server configuration
    #[serde(default)]
    pub server: ServerSettings,

    /// Domain under which project hostnames are allocated
    #[serde(default = "default_base_domain")]
    pub base_domain: String,

    /// Scheme of public URLs
    #[serde(default = "default_public_scheme")]
    pub public_scheme: String,

    /// Webhook HMAC secret; empty accepts any signed request
    #[serde(default = "default_webhook_secret", skip_serializing)]
    pub webhook_secret: SecretString,

    /// Number of build workers
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Parent directory of per-deployment checkouts
    #[serde(default = "default_workspace_dir")]
    pub workspace_dir: PathBuf,

    /// Keep checkouts after builds
    #[serde(default)]
    pub keep_workspace: bool,

    /// Registry prefix for image tags; images are pushed when set
    #[serde(default)]
    pub image_registry: Option<String>,

    /// Cluster publishing configuration
    #[serde(default)]
    pub publishing: PublishingSettings,

    /// Cap on hostname collision suffixes
    #[serde(default = "default_max_probe")]
    pub hostname_max_probe: u32,

    /// Only deploy pushes to each project's target branch
    #[serde(default)]
    pub only_target_branch: bool,

    /// Repositories registered at startup
    #[serde(default)]
    pub projects: Vec<Registration>,
}

fn default_base_domain() -> String {
    "localhost".to_string()
}

fn default_public_scheme() -> String {
    "http".to_string()
}

fn default_webhook_secret() -> SecretString {
    SecretString::from(String::new())
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

fn default_max_probe() -> u32 {
    DEFAULT_MAX_PROBE
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_json: false,
            log_dir: None,
            server: ServerSettings::default(),
            base_domain: default_base_domain(),
            public_scheme: default_public_scheme(),
            webhook_secret: default_webhook_secret(),
            workers: default_workers(),
            workspace_dir: default_workspace_dir(),
            keep_workspace: false,
            image_registry: None,
            publishing: PublishingSettings::default(),
            hostname_max_probe: default_max_probe(),
            only_target_branch: false,
            projects: Vec::new(),
        }
    }
}

impl Settings {
    /// Read settings from a file; a missing file yields defaults
    pub async fn load(file: &File) -> Result<Self, ControllerError> {
        if !file.exists().await {
            return Ok(Self::default());
        }
        file.read_json::<Settings>().await
    }

    /// Apply `BASE_DOMAIN`, `WEBHOOK_SECRET` and `LAUNCHPAD_LOG` overrides
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ControllerError> {
        if let Some(domain) = lookup("BASE_DOMAIN").filter(|v| !v.is_empty()) {
            self.base_domain = domain;
        }
        if let Some(secret) = lookup("WEBHOOK_SECRET") {
            self.webhook_secret = SecretString::from(secret);
        }
        if let Some(level) = lookup("LAUNCHPAD_LOG").filter(|v| !v.is_empty()) {
            self.log_level = level.parse().map_err(ControllerError::ConfigError)?;
        }
        Ok(())
    }
}

/// Webhook server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_server_host")]
    pub host: String,

    #[serde(default = "default_server_port")]
    pub port: u16,
}

fn default_server_host() -> String {
    "0.0.0.0".to_string()
}

fn default_server_port() -> u16 {
    8080
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}

/// Cluster publishing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishingSettings {
    /// Publish built images to the cluster
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Kubeconfig path; inferred (KUBECONFIG, ~/.kube/config, in-cluster) when absent
    #[serde(default)]
    pub kubeconfig: Option<PathBuf>,

    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default)]
    pub ingress_class: Option<String>,

    /// Environment injected into every workload; project variables win
    #[serde(default = "default_env")]
    pub default_env: BTreeMap<String, String>,
}

fn default_true() -> bool {
    true
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_env() -> BTreeMap<String, String> {
    BTreeMap::from([("PORT".to_string(), "8080".to_string())])
}

impl Default for PublishingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            kubeconfig: None,
            namespace: default_namespace(),
            ingress_class: None,
            default_env: default_env(),
        }
    }
}
