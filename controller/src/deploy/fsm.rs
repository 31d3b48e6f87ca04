//! Finite State Machine for deployment lifecycle

use crate::models::DeploymentStatus;

/// Deployment event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentEvent {
    /// A worker picked the deployment off the queue
    BuildStarted,

    /// Image build succeeded
    BuildSucceeded,

    /// Workload is reachable at its hostname
    Published,

    /// Build, publish or enqueue error
    Failed(String),
}

impl DeploymentStatus {
    /// Whether `next` is a legal successor of this status
    pub fn can_transition_to(&self, next: DeploymentStatus) -> bool {
        use DeploymentStatus::*;
        matches!(
            (self, next),
            (Pending, Building)
                | (Building, Deploying)
                | (Deploying, Deployed)
                | (Pending, Failed)
                | (Building, Failed)
                | (Deploying, Failed)
        )
    }
}

/// Deployment FSM
#[derive(Debug, Clone)]
pub struct DeploymentFsm {
    state: DeploymentStatus,
    error: Option<String>,
}

impl DeploymentFsm {
    /// Create a new FSM in pending state
    pub fn new() -> Self {
        Self::from_status(DeploymentStatus::Pending)
    }

    /// Resume an FSM at a stored status
    pub fn from_status(state: DeploymentStatus) -> Self {
        Self { state, error: None }
    }

    /// Get current state
    pub fn state(&self) -> DeploymentStatus {
        self.state
    }

    /// Get error message if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: DeploymentEvent) -> Result<DeploymentStatus, String> {
        let next = match &event {
            DeploymentEvent::BuildStarted => DeploymentStatus::Building,
            DeploymentEvent::BuildSucceeded => DeploymentStatus::Deploying,
            DeploymentEvent::Published => DeploymentStatus::Deployed,
            DeploymentEvent::Failed(_) => DeploymentStatus::Failed,
        };

        if !self.state.can_transition_to(next) {
            return Err(format!("Invalid transition: {:?} -> {:?}", self.state, event));
        }

        if let DeploymentEvent::Failed(err) = event {
            self.error = Some(err);
        }
        self.state = next;
        Ok(next)
    }
}

impl Default for DeploymentFsm {
    fn default() -> Self {
        Self::new()
    }
}
