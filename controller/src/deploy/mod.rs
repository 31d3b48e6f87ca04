//! Build and deployment

pub mod docker;
pub mod fsm;
pub mod git;
pub mod pipeline;
pub mod recipe;

pub use docker::{DockerCli, ImageBuilder};
pub use git::{GitCli, SourceFetcher};
pub use pipeline::{BuildPipeline, PipelineOptions, Publishing};
