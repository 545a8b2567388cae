//! Fixed-window per-client rate limiting
//!
//! Counters live either in process (moka) or in Redis when `REDIS_URL` is
//! configured, so several proxy instances can share one budget per client.

use crate::error::{AppError, ProxyError, Result};
use async_trait::async_trait;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use fred::clients::Pool;
use fred::interfaces::{ClientLike, KeysInterface};
use fred::types::{Builder, Expiration, SetOptions};
use moka::future::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Prefix for rate limit keys stored in Redis
const REDIS_KEY_PREFIX: &str = "gh-ratelimit:";

/// Hits recorded for one client in the current window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowHits {
    pub count: u64,
    pub reset_after: Duration,
}

/// Backing store for window counters
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Record one hit for `key` and return the window's running total
    async fn increment(&self, key: &str) -> Result<WindowHits>;
}

struct Window {
    started: Instant,
    count: AtomicU64,
}

/// In-process store; each window entry expires with the window itself
pub struct MemoryStore {
    windows: Cache<String, Arc<Window>>,
    window: Duration,
}

impl MemoryStore {
    pub fn new(window: Duration) -> Self {
        let windows = Cache::builder()
            .max_capacity(100_000)
            .time_to_live(window)
            .build();

        Self { windows, window }
    }
}

#[async_trait]
impl RateLimitStore for MemoryStore {
    async fn increment(&self, key: &str) -> Result<WindowHits> {
        let window = self
            .windows
            .get_with(key.to_string(), async {
                Arc::new(Window {
                    started: Instant::now(),
                    count: AtomicU64::new(0),
                })
            })
            .await;

        let count = window.count.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(WindowHits {
            count,
            reset_after: self.window.saturating_sub(window.started.elapsed()),
        })
    }
}

/// Redis-backed store shared between proxy instances
pub struct RedisStore {
    pool: Pool,
    window: Duration,
}

impl RedisStore {
    /// Connect to Redis and verify the connection
    pub async fn connect(url: &str, window: Duration) -> Result<Self> {
        let config = fred::types::config::Config::from_url(url).map_err(store_error)?;
        let pool = Builder::from_config(config)
            .build_pool(4)
            .map_err(store_error)?;
        pool.init().await.map_err(store_error)?;

        info!("Connected to Redis rate limit store");
        Ok(Self { pool, window })
    }

    fn window_secs(&self) -> i64 {
        self.window.as_secs().max(1) as i64
    }
}

#[async_trait]
impl RateLimitStore for RedisStore {
    async fn increment(&self, key: &str) -> Result<WindowHits> {
        let key = format!("{}{}", REDIS_KEY_PREFIX, key);
        let secs = self.window_secs();

        // Opens the window only if none is running
        let _: () = self
            .pool
            .set(
                key.as_str(),
                0_i64,
                Some(Expiration::EX(secs)),
                Some(SetOptions::NX),
                false,
            )
            .await
            .map_err(store_error)?;

        let count: i64 = self.pool.incr(key.as_str()).await.map_err(store_error)?;
        let mut ttl: i64 = self.pool.ttl(key.as_str()).await.map_err(store_error)?;

        if ttl < 0 {
            // The window expired between SET and INCR and INCR recreated the
            // key without an expiry; start a fresh window with this hit.
            let _: () = self
                .pool
                .set(
                    key.as_str(),
                    count,
                    Some(Expiration::EX(secs)),
                    Some(SetOptions::XX),
                    false,
                )
                .await
                .map_err(store_error)?;
            ttl = secs;
        }

        Ok(WindowHits {
            count: count.max(0) as u64,
            reset_after: Duration::from_secs(ttl.max(0) as u64),
        })
    }
}

fn store_error(err: impl std::fmt::Display) -> ProxyError {
    ProxyError::RateLimitStore(err.to_string())
}

/// Outcome of checking one request against the limit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    pub reset_after: Duration,
}

impl RateLimitDecision {
    fn apply_headers(&self, headers: &mut HeaderMap) {
        headers.insert("RateLimit-Limit", HeaderValue::from(self.limit));
        headers.insert("RateLimit-Remaining", HeaderValue::from(self.remaining));
        headers.insert(
            "RateLimit-Reset",
            HeaderValue::from(self.reset_after.as_secs()),
        );
    }
}

/// Allows `limit` requests per client per window
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    limit: u64,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, limit: u64) -> Self {
        Self { store, limit }
    }

    /// Count a request from `client` and decide whether it may proceed
    pub async fn check(&self, client: &str) -> Result<RateLimitDecision> {
        let hits = self.store.increment(client).await?;

        Ok(RateLimitDecision {
            allowed: hits.count <= self.limit,
            limit: self.limit,
            remaining: self.limit.saturating_sub(hits.count),
            reset_after: hits.reset_after,
        })
    }
}

/// Identify the client by proxy headers; all unidentified clients share a bucket
pub fn client_key(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .or_else(|| {
            headers
                .get("cf-connecting-ip")
                .and_then(|v| v.to_str().ok())
        })
        .map(|v| v.trim().to_string())
        .unwrap_or_default()
}

/// Middleware enforcing the limit; store failures let the request through
pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_key(request.headers());

    let decision = match limiter.check(&client).await {
        Ok(decision) => decision,
        Err(e) => {
            warn!(client = %client, error = %e, "Rate limit check failed, allowing request");
            return next.run(request).await;
        }
    };

    if !decision.allowed {
        debug!(client = %client, limit = decision.limit, "Rate limit exceeded");
        let mut response = AppError::TooManyRequests {
            retry_after_secs: decision.reset_after.as_secs().max(1),
        }
        .into_response();
        decision.apply_headers(response.headers_mut());
        return response;
    }

    let mut response = next.run(request).await;
    decision.apply_headers(response.headers_mut());
    response
}
