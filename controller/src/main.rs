//! Launchpad - Entry Point
//!
//! Receives repository push webhooks, builds container images and publishes
//! them to a Kubernetes cluster behind one stable hostname per project.

use std::collections::HashMap;
use std::env;

use launchpad::app::options::AppOptions;
use launchpad::app::run::run;
use launchpad::filesys::file::File;
use launchpad::logs::{init_logging, LogOptions};
use launchpad::storage::layout::StorageLayout;
use launchpad::storage::settings::Settings;
use launchpad::utils::version_info;

use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    let version = version_info();
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version) {
            Ok(json) => println!("{}", json),
            Err(_) => println!("{}", version.version),
        }
        return;
    }

    let layout = match cli_args.get("base-dir") {
        Some(dir) => StorageLayout::new(dir),
        None => StorageLayout::default(),
    };

    // Retrieve the settings file
    let settings_file = match cli_args.get("config") {
        Some(path) => File::new(path),
        None => layout.settings_file(),
    };
    let mut settings = match Settings::load(&settings_file).await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!(
                "Unable to read settings file {}: {}",
                settings_file.path().display(),
                e
            );
            std::process::exit(1);
        }
    };
    if let Err(e) = settings.apply_env(|key| env::var(key).ok()) {
        eprintln!("Invalid environment override: {}", e);
        std::process::exit(1);
    }

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        json_format: settings.log_json,
        log_dir: settings.log_dir.clone(),
        ..Default::default()
    };
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            println!("Failed to initialize logging: {e}");
            None
        }
    };

    // Run the controller
    let options = AppOptions::from_settings(&settings, layout);
    info!("Running launchpad {} with options: {:?}", version.version, options);
    if let Err(e) = run(options, await_shutdown_signal()).await {
        error!("Failed to run launchpad: {e}");
        std::process::exit(1);
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("Failed to listen for SIGTERM");
        let mut sigint = signal(SignalKind::interrupt()).expect("Failed to listen for SIGINT");

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
        info!("Ctrl+C received, shutting down...");
    }
}
