//! Data types for GitHub API requests and responses

use serde::{Deserialize, Serialize};

/// Directory under which registry items are published in a repository
pub const REGISTRY_PREFIX: &str = "public/r/";

/// Response of the git trees endpoint
///
/// Only the fields the resolver needs are modeled; GitHub sends more.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeResponse {
    pub sha: String,
    pub url: Option<String>,
    pub tree: Vec<TreeItem>,
    #[serde(default)]
    pub truncated: bool,
}

/// A single blob or tree entry of a repository tree
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TreeItem {
    pub path: String,
    #[serde(rename = "type", default)]
    pub item_type: Option<String>,
    /// Absent for submodule entries
    #[serde(default)]
    pub url: Option<String>,
}

/// Identifies one registry file on one branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRequest {
    pub owner: String,
    pub repo: String,
    pub branch: String,
    /// Path relative to [`REGISTRY_PREFIX`]
    pub filepath: String,
}

impl FileRequest {
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        branch: impl Into<String>,
        filepath: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            branch: branch.into(),
            filepath: filepath.into(),
        }
    }

    /// Full path of the file inside the repository
    pub fn tree_path(&self) -> String {
        format!("{}{}", REGISTRY_PREFIX, self.filepath)
    }
}
