//! Rust client for fetching registry files from GitHub
//!
//! A registry file is located in two steps: the repository tree for a branch
//! is listed through the git trees API, then the matching item under
//! `public/r/` is downloaded from the raw content host and decoded as JSON.
//!
//! # Example
//!
//! ```no_run
//! use github_tree_api::{FileRequest, GithubClient};
//!
//! # async fn example() -> Result<(), github_tree_api::GithubError> {
//! let client = GithubClient::new(std::env::var("GH_TOKEN").ok());
//!
//! let request = FileRequest::new("shadcn-ui", "ui", "main", "button.json");
//! let item: serde_json::Value = client.fetch_file(&request).await?;
//! println!("{}", item["name"]);
//! # Ok(())
//! # }
//! ```
//!
//! # API Coverage
//!
//! - `GET /repos/{owner}/{repo}/git/trees/{branch}?recursive=1` - Recursive repository tree
//! - `GET {raw}/{owner}/{repo}/refs/heads/{branch}/{path}` - Raw file content

mod client;
mod error;
mod types;

pub use client::GithubClient;
pub use error::{GithubError, Result};
pub use types::{FileRequest, TreeItem, TreeResponse, REGISTRY_PREFIX};
