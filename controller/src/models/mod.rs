//! Persistent records owned by the controller

pub mod build;
pub mod deployment;
pub mod hostname;
pub mod project;

pub use build::{Build, BuildStatus};
pub use deployment::{Deployment, DeploymentStatus, NewDeployment};
pub use hostname::Hostname;
pub use project::{NewProject, Project, RepoCoordinates};

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

record_id!(
    /// Project identifier
    ProjectId
);
record_id!(
    /// Deployment identifier
    DeploymentId
);
record_id!(
    /// Build identifier
    BuildId
);
record_id!(
    /// Hostname allocation identifier
    HostnameId
);
