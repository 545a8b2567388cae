//! Remote resolution of registry files

use crate::types::FileIdentity;
use async_trait::async_trait;
use github_tree_api::{FileRequest, GithubClient, GithubError};
use serde_json::Value;
use std::fmt;
use tracing::{debug, warn};

/// Why a file could not be resolved
#[derive(Debug)]
pub enum ResolveError {
    /// The file does not exist upstream under the registry path convention
    NotFound,
    /// Network, status, or decode failure unrelated to the file's existence
    Transient(String),
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::NotFound => write!(f, "file not found"),
            ResolveError::Transient(msg) => write!(f, "upstream failure: {}", msg),
        }
    }
}

impl std::error::Error for ResolveError {}

impl From<GithubError> for ResolveError {
    fn from(err: GithubError) -> Self {
        if err.is_not_found() {
            ResolveError::NotFound
        } else {
            ResolveError::Transient(err.to_string())
        }
    }
}

/// Fetches a file's decoded content on cache miss
#[async_trait]
pub trait FileResolver<T>: Send + Sync {
    async fn fetch_file(&self, identity: &FileIdentity) -> Result<T, ResolveError>;
}

/// Resolves files from a fixed branch of GitHub repositories
pub struct GithubResolver {
    client: GithubClient,
    branch: String,
}

impl GithubResolver {
    pub fn new(client: GithubClient, branch: impl Into<String>) -> Self {
        Self {
            client,
            branch: branch.into(),
        }
    }

    fn request_for(&self, identity: &FileIdentity) -> FileRequest {
        FileRequest::new(
            identity.owner.as_str(),
            identity.repo.as_str(),
            self.branch.as_str(),
            identity.filepath.as_str(),
        )
    }
}

#[async_trait]
impl FileResolver<Value> for GithubResolver {
    async fn fetch_file(&self, identity: &FileIdentity) -> Result<Value, ResolveError> {
        let request = self.request_for(identity);

        match self.client.fetch_file::<Value>(&request).await {
            Ok(value) => {
                debug!(identity = %identity, branch = %self.branch, "Resolved file from GitHub");
                Ok(value)
            }
            Err(e) if e.is_not_found() => {
                debug!(identity = %identity, error = %e, "File not found on GitHub");
                Err(ResolveError::NotFound)
            }
            Err(e) => {
                warn!(identity = %identity, error = %e, "Failed to resolve file from GitHub");
                Err(e.into())
            }
        }
    }
}
