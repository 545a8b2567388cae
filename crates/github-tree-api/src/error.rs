//! Error types for the GitHub client

use std::fmt;

/// Errors that can occur when resolving a file through GitHub
#[derive(Debug)]
pub enum GithubError {
    /// The repository, branch, or file does not exist
    NotFound(String),
    /// HTTP request failed
    Http(Box<reqwest::Error>),
    /// GitHub answered with an unexpected status code
    Status { status: u16, url: String },
    /// Failed to parse JSON response
    Json(serde_json::Error),
}

impl GithubError {
    /// Whether this error means the requested resource is absent upstream
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl fmt::Display for GithubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(what) => write!(f, "GitHub resource not found: {}", what),
            Self::Http(e) => write!(f, "GitHub HTTP error: {}", e),
            Self::Status { status, url } => {
                write!(f, "GitHub returned status {} for {}", status, url)
            }
            Self::Json(e) => write!(f, "GitHub JSON parse error: {}", e),
        }
    }
}

impl std::error::Error for GithubError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Http(e) => Some(e.as_ref()),
            Self::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for GithubError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(Box::new(e))
    }
}

impl From<serde_json::Error> for GithubError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

/// Result type for GitHub client operations
pub type Result<T> = std::result::Result<T, GithubError>;
