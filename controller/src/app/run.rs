//! Main application run loop

use std::future::Future;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::app::options::{AppOptions, LifecycleOptions};
use crate::app::state::{AppState, Collaborators};
use crate::deploy::{DockerCli, GitCli};
use crate::errors::ControllerError;
use crate::publish::{KubeTarget, PublishTarget};
use crate::server::serve::serve;
use crate::server::state::ServerState;
use crate::store::{LocalStore, RecordStore};
use crate::workers::WorkerPool;

/// Run the controller until `shutdown_signal` resolves
pub async fn run(
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), ControllerError> {
    info!("Initializing launchpad...");

    // Create shutdown channel
    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);
    let mut shutdown_manager =
        ShutdownManager::new(shutdown_tx.clone(), options.lifecycle.clone());

    if let Err(e) = init(&options, shutdown_tx.clone(), &mut shutdown_manager).await {
        error!("Failed to start launchpad: {}", e);
        shutdown_manager.shutdown().await?;
        return Err(e);
    }

    shutdown_signal.await;
    info!("Shutdown signal received, shutting down...");

    drop(shutdown_tx);
    shutdown_manager.shutdown().await
}

// =============================== INITIALIZATION ================================== //

async fn init(
    options: &AppOptions,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_manager: &mut ShutdownManager,
) -> Result<Arc<AppState>, ControllerError> {
    options.storage.setup().await?;

    let store: Arc<dyn RecordStore> =
        Arc::new(LocalStore::open(options.storage.store_file()).await?);
    let collaborators = init_collaborators(options).await;
    let app_state = Arc::new(AppState::new(options, store, collaborators));
    app_state.register_projects(&options.projects).await?;

    init_worker_pool(app_state.clone(), shutdown_manager)?;
    init_webhook_server(options, app_state.clone(), shutdown_manager, shutdown_tx.subscribe())
        .await?;

    Ok(app_state)
}

async fn init_collaborators(options: &AppOptions) -> Collaborators {
    let push = options
        .pipeline
        .registry
        .as_deref()
        .is_some_and(|r| !r.is_empty());

    let target = if options.enable_publishing {
        match KubeTarget::connect(options.kubeconfig.as_deref()).await {
            Ok(target) => Some(Arc::new(target) as Arc<dyn PublishTarget>),
            Err(e) => {
                warn!("Kubernetes unavailable, publishing disabled: {}", e);
                None
            }
        }
    } else {
        info!("Publishing disabled by settings");
        None
    };

    Collaborators {
        fetcher: Arc::new(GitCli::default()),
        builder: Arc::new(DockerCli::default().with_push(push)),
        target,
    }
}

fn init_worker_pool(
    app_state: Arc<AppState>,
    shutdown_manager: &mut ShutdownManager,
) -> Result<(), ControllerError> {
    info!("Initializing worker pool...");
    app_state.pool.start()?;
    shutdown_manager.with_worker_pool(app_state.pool.clone())
}

async fn init_webhook_server(
    options: &AppOptions,
    app_state: Arc<AppState>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), ControllerError> {
    info!("Initializing webhook server...");

    let server_state = ServerState::new(
        app_state.ingestor.clone(),
        options.webhook_secret.clone(),
    );

    let server_handle = serve(&options.server, Arc::new(server_state), async move {
        let _ = shutdown_rx.recv().await;
    })
    .await?;

    shutdown_manager.with_server_handle(server_handle)
}

// ================================= SHUTDOWN ===================================== //

struct ShutdownManager {
    shutdown_tx: broadcast::Sender<()>,
    lifecycle_options: LifecycleOptions,
    worker_pool: Option<Arc<WorkerPool>>,
    server_handle: Option<JoinHandle<Result<(), ControllerError>>>,
}

impl ShutdownManager {
    pub fn new(shutdown_tx: broadcast::Sender<()>, lifecycle_options: LifecycleOptions) -> Self {
        Self {
            shutdown_tx,
            lifecycle_options,
            worker_pool: None,
            server_handle: None,
        }
    }

    pub fn with_worker_pool(&mut self, pool: Arc<WorkerPool>) -> Result<(), ControllerError> {
        if self.worker_pool.is_some() {
            return Err(ControllerError::ShutdownError(
                "worker_pool already set".to_string(),
            ));
        }
        self.worker_pool = Some(pool);
        Ok(())
    }

    pub fn with_server_handle(
        &mut self,
        handle: JoinHandle<Result<(), ControllerError>>,
    ) -> Result<(), ControllerError> {
        if self.server_handle.is_some() {
            return Err(ControllerError::ShutdownError(
                "server_handle already set".to_string(),
            ));
        }
        self.server_handle = Some(handle);
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), ControllerError> {
        let _ = self.shutdown_tx.send(());

        match tokio::time::timeout(
            self.lifecycle_options.max_shutdown_delay,
            self.shutdown_impl(),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                error!(
                    "Shutdown timed out after {:?}",
                    self.lifecycle_options.max_shutdown_delay
                );
                Err(ControllerError::ShutdownError(format!(
                    "timed out after {:?}",
                    self.lifecycle_options.max_shutdown_delay
                )))
            }
        }
    }

    async fn shutdown_impl(&mut self) -> Result<(), ControllerError> {
        info!("Shutting down launchpad...");

        // 1. Webhook server, so nothing new is enqueued
        if let Some(handle) = self.server_handle.take() {
            handle
                .await
                .map_err(|e| ControllerError::ShutdownError(e.to_string()))??;
        }

        // 2. Worker pool
        if let Some(pool) = self.worker_pool.take() {
            pool.stop().await?;
        }

        info!("Shutdown complete");
        Ok(())
    }
}
