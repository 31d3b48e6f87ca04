//! HTTP request handlers

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use secrecy::ExposeSecret;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::IngestError;
use crate::ingest::{signature, IngestOutcome, WebhookEvent};
use crate::models::Deployment;
use crate::server::state::ServerState;
use crate::utils::version_info;

pub const EVENT_HEADER: &str = "X-GitHub-Event";
pub const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";
pub const DELIVERY_HEADER: &str = "X-GitHub-Delivery";

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "launchpad".to_string(),
        version: version.version,
    })
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    Json(version_info())
}

/// Webhook response for accepted events
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment: Option<Deployment>,
}

impl WebhookResponse {
    fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            deployment: None,
        }
    }
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        let status = match &self {
            IngestError::Malformed(_) => StatusCode::BAD_REQUEST,
            IngestError::InvalidSignature => StatusCode::UNAUTHORIZED,
            IngestError::ProjectNotFound { .. } => StatusCode::NOT_FOUND,
            IngestError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        error_response(status, self.to_string())
    }
}

/// GitHub webhook handler
pub async fn github_webhook_handler(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, IngestError> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    let delivery = header(DELIVERY_HEADER)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    if let Err(e) = signature::verify(
        state.webhook_secret.expose_secret(),
        header(SIGNATURE_HEADER),
        &body,
    ) {
        warn!(delivery = %delivery, "Rejected webhook with invalid signature");
        return Err(e);
    }

    let push = match WebhookEvent::parse(header(EVENT_HEADER).unwrap_or_default(), &body)? {
        WebhookEvent::Push(push) => push,
        WebhookEvent::Other(event) => {
            debug!(delivery = %delivery, "Ignoring webhook event '{}'", event);
            return Ok(Json(WebhookResponse::message("Event ignored")).into_response());
        }
    };

    debug!(
        delivery = %delivery,
        "Push to {}/{} at {}", push.repo_owner, push.repo_name, push.commit_sha
    );
    let response = match state.ingestor.ingest(&push).await? {
        IngestOutcome::Queued(deployment) => Json(WebhookResponse {
            message: "Deployment triggered".to_string(),
            deployment: Some(deployment),
        })
        .into_response(),
        IngestOutcome::Unqueued(deployment) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(WebhookResponse {
                message: "Build queue unavailable".to_string(),
                deployment: Some(deployment),
            }),
        )
            .into_response(),
        IngestOutcome::Ignored(reason) => Json(WebhookResponse::message(reason)).into_response(),
    };
    Ok(response)
}
