//! Launchpad
//!
//! Continuous-deployment controller: turns repository pushes into container
//! builds and publishes them behind one stable hostname per project.

pub mod app;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod hostname;
pub mod ingest;
pub mod logs;
pub mod models;
pub mod publish;
pub mod queue;
pub mod server;
pub mod storage;
pub mod store;
pub mod utils;
pub mod workers;
