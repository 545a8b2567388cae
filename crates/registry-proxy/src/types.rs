//! Core types for the registry proxy

use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// The (owner, repo, filepath) triple a registry item is requested by
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileIdentity {
    pub owner: String,
    pub repo: String,
    pub filepath: String,
}

impl FileIdentity {
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        filepath: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            filepath: filepath.into(),
        }
    }

    /// Key used for the resolved file in the cache
    pub fn cache_key(&self) -> String {
        format!("{}/{}/{}", self.owner, self.repo, self.filepath)
    }
}

impl fmt::Display for FileIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.owner, self.repo, self.filepath)
    }
}

/// Whether a response was served from the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    /// Value of the `X-Cache` response header
    pub fn as_header(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

/// A successfully resolved file
#[derive(Debug, Clone)]
pub struct Resolution<T> {
    pub value: T,
    pub status: CacheStatus,
    /// How much longer the served value stays cached
    pub max_age: Duration,
}

/// Query parameters accepted on file routes
#[derive(Debug, Default, Deserialize)]
pub struct ResolveQuery {
    #[serde(default)]
    pub force: Option<String>,
}

impl ResolveQuery {
    /// `?force=true` and `?force=1` bypass the cache
    pub fn force_refresh(&self) -> bool {
        matches!(self.force.as_deref(), Some("true") | Some("1"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key() {
        let identity = FileIdentity::new("shadcn", "ui", "styles/default/button.json");
        assert_eq!(identity.cache_key(), "shadcn/ui/styles/default/button.json");
        assert_eq!(identity.to_string(), identity.cache_key());
    }

    #[test]
    fn test_cache_status_header() {
        assert_eq!(CacheStatus::Hit.as_header(), "HIT");
        assert_eq!(CacheStatus::Miss.as_header(), "MISS");
    }

    #[test]
    fn test_force_refresh_values() {
        let query = |v: &str| ResolveQuery {
            force: Some(v.to_string()),
        };

        assert!(query("true").force_refresh());
        assert!(query("1").force_refresh());
        assert!(!query("yes").force_refresh());
        assert!(!query("0").force_refresh());
        assert!(!ResolveQuery::default().force_refresh());
    }
}
