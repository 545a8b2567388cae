//! Registry Proxy - caching proxy for shadcn registry items on GitHub
//!
//! Resolves `/{owner}/{repo}/{filepath}.json` to the file published under
//! `public/r/` in that repository and keeps it in memory for a fixed TTL.

mod config;
mod error;
mod orchestrator;
mod rate_limit;
mod resolver;
mod server;
mod types;

use crate::config::Config;
use crate::error::Result;
use crate::orchestrator::FetchOrchestrator;
use crate::rate_limit::{MemoryStore, RateLimitStore, RateLimiter, RedisStore};
use crate::resolver::GithubResolver;
use crate::server::{start_server, ServerState, SharedState};
use chrono::Utc;
use github_tree_api::GithubClient;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};
use ttl_cache::{Sweeper, TtlCache};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let env_filter = EnvFilter::from_default_env().add_directive("registry_proxy=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    };

    info!("Starting Registry Proxy...");

    let config = Config::from_env()?;
    info!("Port: {}", config.port);
    info!("Branch: {}", config.github_branch);
    info!("Cache TTL: {} seconds", config.cache_ttl.as_secs());
    info!(
        "Rate limit: {} requests per {} seconds",
        config.rate_limit_max,
        config.rate_limit_window.as_secs()
    );

    let client = GithubClient::with_base_urls(
        config.github_api_url.as_str(),
        config.github_raw_url.as_str(),
        config.github_token.clone(),
        Duration::from_secs(30),
    );
    if client.is_authenticated() {
        info!("Running with GitHub token authentication");
    } else {
        warn!("Running without GitHub token authentication, rate limits may apply");
    }
    let resolver = Arc::new(GithubResolver::new(client, config.github_branch.clone()));

    let cache = Arc::new(TtlCache::<Value>::new(config.cache_ttl));
    let sweeper = Sweeper::spawn(cache.clone(), config.sweep_interval);

    let store: Arc<dyn RateLimitStore> = match &config.redis_url {
        Some(url) => Arc::new(RedisStore::connect(url, config.rate_limit_window).await?),
        None => {
            info!("REDIS_URL not set, using in-memory rate limit store");
            Arc::new(MemoryStore::new(config.rate_limit_window))
        }
    };
    let limiter = Arc::new(RateLimiter::new(store, config.rate_limit_max));

    let orchestrator = FetchOrchestrator::new(cache.clone(), resolver);
    let state: SharedState = Arc::new(ServerState::new(orchestrator, config.project_url.clone()));

    // Serve until ctrl-c / SIGTERM, then drain connections
    start_server(state.clone(), limiter, config.port, shutdown_signal()).await?;

    sweeper.shutdown().await;
    let stats = state.orchestrator.stats();
    cache.clear();

    info!(
        uptime_secs = (Utc::now() - state.started_at).num_seconds(),
        entries = stats.entries,
        hits = stats.hits,
        misses = stats.misses,
        "Registry Proxy stopped"
    );

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
