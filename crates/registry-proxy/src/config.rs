use crate::error::Result;
use std::env;
use std::time::Duration;
use url::Url;

/// Proxy configuration parsed from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub github_token: Option<String>,
    pub github_branch: String,
    pub github_api_url: Url,
    pub github_raw_url: Url,
    pub cache_ttl: Duration,
    pub sweep_interval: Duration,
    pub rate_limit_max: u64,
    pub rate_limit_window: Duration,
    pub redis_url: Option<String>,
    pub project_url: String,
}

impl Config {
    /// Parse configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Parse configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let number = |name: &str| non_empty(name).and_then(|v| v.trim().parse::<u64>().ok());

        let port = non_empty("PORT")
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(8000);

        let github_api_url = Url::parse(
            &non_empty("GITHUB_API_URL").unwrap_or_else(|| "https://api.github.com".to_string()),
        )?;
        let github_raw_url = Url::parse(
            &non_empty("GITHUB_RAW_URL")
                .unwrap_or_else(|| "https://raw.githubusercontent.com".to_string()),
        )?;

        Ok(Self {
            port,
            github_token: non_empty("GH_TOKEN"),
            github_branch: non_empty("GITHUB_BRANCH").unwrap_or_else(|| "main".to_string()),
            github_api_url,
            github_raw_url,
            cache_ttl: Duration::from_secs(number("CACHE_TTL_SECS").unwrap_or(60 * 60)),
            sweep_interval: Duration::from_secs(
                number("CACHE_SWEEP_INTERVAL_SECS")
                    .filter(|s| *s > 0)
                    .unwrap_or(60),
            ),
            rate_limit_max: number("RATE_LIMIT_MAX").unwrap_or(60),
            rate_limit_window: Duration::from_secs(
                number("RATE_LIMIT_WINDOW_SECS")
                    .filter(|s| *s > 0)
                    .unwrap_or(60),
            ),
            redis_url: non_empty("REDIS_URL"),
            project_url: non_empty("PROJECT_URL")
                .unwrap_or_else(|| "https://github.com/rawnly/shadcn-github-proxy".to_string()),
        })
    }
}
