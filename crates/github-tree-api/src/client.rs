//! GitHub HTTP client

use crate::error::{GithubError, Result};
use crate::types::*;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

/// Client for locating and downloading registry files hosted on GitHub
///
/// When a token is configured every request carries it as a bearer token,
/// which raises the API rate limit from 60 to 5000 requests per hour.
pub struct GithubClient {
    http: reqwest::Client,
    api_base_url: String,
    raw_base_url: String,
    token: Option<String>,
}

impl GithubClient {
    /// Base URL for the GitHub REST API
    pub const API_BASE_URL: &'static str = "https://api.github.com";
    /// Base URL for raw file content
    pub const RAW_BASE_URL: &'static str = "https://raw.githubusercontent.com";

    /// Create a client against github.com with a 30 second timeout
    pub fn new(token: Option<String>) -> Self {
        Self::with_base_urls(
            Self::API_BASE_URL,
            Self::RAW_BASE_URL,
            token,
            Duration::from_secs(30),
        )
    }

    /// Create a client against custom hosts (GitHub Enterprise, test servers)
    pub fn with_base_urls(
        api_base_url: &str,
        raw_base_url: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("registry-proxy/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            raw_base_url: raw_base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
        }
    }

    /// Whether requests are sent with a bearer token
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// List every path in a branch, recursively
    ///
    /// # Arguments
    /// * `owner` - Repository owner (user or organization)
    /// * `repo` - Repository name
    /// * `branch` - Branch name, resolved by GitHub like any tree-ish
    pub async fn get_repository_tree(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> Result<Vec<TreeItem>> {
        let url = format!(
            "{}/repos/{}/{}/git/trees/{}?recursive=1",
            self.api_base_url,
            urlencoding::encode(owner),
            urlencoding::encode(repo),
            encode_path(branch)
        );

        debug!(url = %url, "Fetching repository tree");
        let response = self.authorize(self.http.get(&url)).send().await?;
        let body = Self::check_status(response, &url, || {
            format!("tree {}/{}@{}", owner, repo, branch)
        })?
        .bytes()
        .await?;

        let data: TreeResponse = serde_json::from_slice(&body)?;
        if data.truncated {
            warn!(owner, repo, branch, "Repository tree was truncated by GitHub");
        }

        debug!(owner, repo, branch, items = data.tree.len(), "Fetched repository tree");
        Ok(data.tree)
    }

    /// Find the registry item for `filepath` in a tree
    ///
    /// Matches the exact path `public/r/{filepath}`.
    pub fn find_file<'a>(tree: &'a [TreeItem], filepath: &str) -> Option<&'a TreeItem> {
        let wanted = format!("{}{}", REGISTRY_PREFIX, filepath);
        tree.iter().find(|item| item.path == wanted)
    }

    /// Download a tree item from the raw content host and decode it as JSON
    pub async fn get_file_content<T: DeserializeOwned>(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        item: &TreeItem,
    ) -> Result<T> {
        let url = format!(
            "{}/{}/{}/refs/heads/{}/{}",
            self.raw_base_url,
            urlencoding::encode(owner),
            urlencoding::encode(repo),
            encode_path(branch),
            encode_path(&item.path)
        );

        debug!(url = %url, "Fetching raw file content");
        let response = self.authorize(self.http.get(&url)).send().await?;
        let body = Self::check_status(response, &url, || item.path.clone())?
            .bytes()
            .await?;

        Ok(serde_json::from_slice(&body)?)
    }

    /// Resolve a registry file: list the tree, find the item, fetch its content
    pub async fn fetch_file<T: DeserializeOwned>(&self, request: &FileRequest) -> Result<T> {
        let tree = self
            .get_repository_tree(&request.owner, &request.repo, &request.branch)
            .await?;

        let item = Self::find_file(&tree, &request.filepath)
            .ok_or_else(|| GithubError::NotFound(request.tree_path()))?;

        self.get_file_content(&request.owner, &request.repo, &request.branch, item)
            .await
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn check_status(
        response: Response,
        url: &str,
        not_found: impl FnOnce() -> String,
    ) -> Result<Response> {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(GithubError::NotFound(not_found()));
        }
        if !status.is_success() {
            warn!(status = %status, url = %url, "GitHub request failed");
            return Err(GithubError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }
}

/// Percent-encode each `/`-separated segment, keeping the separators
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

impl Default for GithubClient {
    fn default() -> Self {
        Self::new(None)
    }
}
