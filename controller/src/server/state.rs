//! Server state

use std::sync::Arc;

use secrecy::SecretString;

use crate::ingest::Ingestor;

/// Server state shared across handlers
pub struct ServerState {
    pub ingestor: Arc<Ingestor>,

    /// HMAC secret for `X-Hub-Signature-256`; empty disables verification
    pub webhook_secret: SecretString,
}

impl ServerState {
    pub fn new(ingestor: Arc<Ingestor>, webhook_secret: SecretString) -> Self {
        Self {
            ingestor,
            webhook_secret,
        }
    }
}
