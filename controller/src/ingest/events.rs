//! GitHub webhook events

use serde::Deserialize;

use crate::errors::IngestError;

pub const DEFAULT_BRANCH: &str = "main";

/// Webhook event, resolved once from the `X-GitHub-Event` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    Push(PushEvent),
    /// Any other event kind; acknowledged and ignored
    Other(String),
}

impl WebhookEvent {
    /// Resolve and parse an event from its header and raw body
    pub fn parse(event: &str, body: &[u8]) -> Result<Self, IngestError> {
        match event {
            "push" => PushEvent::from_json(body).map(WebhookEvent::Push),
            other => Ok(WebhookEvent::Other(other.to_string())),
        }
    }
}

/// Push event fields needed to create a deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushEvent {
    pub repo_owner: String,
    pub repo_name: String,
    pub clone_url: Option<String>,
    pub branch: String,
    pub commit_sha: String,
    pub commit_message: String,
}

#[derive(Debug, Deserialize)]
struct RawPush {
    #[serde(rename = "ref")]
    git_ref: Option<String>,
    repository: Option<RawRepository>,
    head_commit: Option<RawCommit>,
}

#[derive(Debug, Deserialize)]
struct RawRepository {
    name: Option<String>,
    owner: Option<RawOwner>,
    clone_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawOwner {
    login: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCommit {
    id: Option<String>,
    message: Option<String>,
}

fn required(value: Option<String>, what: &str) -> Result<String, IngestError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| IngestError::Malformed(format!("{} missing", what)))
}

impl PushEvent {
    pub fn from_json(body: &[u8]) -> Result<Self, IngestError> {
        let raw: RawPush = serde_json::from_slice(body)
            .map_err(|e| IngestError::Malformed(format!("Failed to parse webhook: {}", e)))?;

        let repo = raw
            .repository
            .ok_or_else(|| IngestError::Malformed("Repository information missing".to_string()))?;
        let owner = repo.owner.and_then(|o| o.login);
        let repo_owner = required(owner, "Repository owner")?;
        let repo_name = required(repo.name, "Repository name")?;

        let head = raw
            .head_commit
            .ok_or_else(|| IngestError::Malformed("Head commit information missing".to_string()))?;
        let commit_sha = required(head.id, "Commit SHA")?;

        Ok(Self {
            repo_owner,
            repo_name,
            clone_url: repo.clone_url,
            branch: branch_from_ref(raw.git_ref.as_deref()),
            commit_sha,
            commit_message: head.message.unwrap_or_default(),
        })
    }
}

/// Branch named by a push ref: `refs/heads/<branch>`, otherwise the last
/// path segment, defaulting to `main`
pub fn branch_from_ref(git_ref: Option<&str>) -> String {
    let Some(git_ref) = git_ref else {
        return DEFAULT_BRANCH.to_string();
    };
    let branch = match git_ref.strip_prefix("refs/heads/") {
        Some(branch) => branch,
        None => git_ref.rsplit('/').next().unwrap_or_default(),
    };
    if branch.is_empty() {
        DEFAULT_BRANCH.to_string()
    } else {
        branch.to_string()
    }
}
