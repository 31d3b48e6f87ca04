//! Logging configuration

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::errors::ControllerError;

/// Log level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_filter_string(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(format!("Invalid log level: {}", s)),
        }
    }
}

impl serde::Serialize for LogLevel {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_filter_string())
    }
}

impl<'de> serde::Deserialize<'de> for LogLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Logging options
#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Log level, used when `RUST_LOG` is unset
    pub log_level: LogLevel,

    /// Write logs to stdout
    pub stdout: bool,

    /// Directory for daily-rolling log files; no file output when `None`
    pub log_dir: Option<PathBuf>,

    /// Enable JSON format on stdout
    pub json_format: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            stdout: true,
            log_dir: None,
            json_format: false,
        }
    }
}

pub const LOG_FILE_PREFIX: &str = "launchpad.log";

/// Initialize logging.
///
/// The returned guard flushes the file writer on drop and must be held for
/// the lifetime of the process.
pub fn init_logging(options: LogOptions) -> Result<Option<WorkerGuard>, ControllerError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(options.log_level.to_filter_string()));

    let (file_layer, guard) = match &options.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    let plain_layer = (options.stdout && !options.json_format).then(fmt::layer);
    let json_layer = (options.stdout && options.json_format).then(|| fmt::layer().json());

    tracing_subscriber::registry()
        .with(filter)
        .with(plain_layer)
        .with(json_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| ControllerError::ConfigError(e.to_string()))?;

    Ok(guard)
}
