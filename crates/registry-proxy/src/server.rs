//! HTTP server for registry proxy endpoints
//!
//! Provides `/`, `/healthz`, and `/{owner}/{repo}/{*filepath}` endpoints.

use crate::error::AppError;
use crate::orchestrator::FetchOrchestrator;
use crate::rate_limit::{rate_limit, RateLimiter};
use crate::resolver::ResolveError;
use crate::types::{FileIdentity, ResolveQuery};
use axum::{
    extract::{Path, Query, State},
    http::{header, Method, StatusCode, Uri},
    middleware,
    response::{IntoResponse, Json, Response},
    routing::{any, get},
    Router,
};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, info_span, Instrument};

/// Shared state for the HTTP server
pub struct ServerState {
    pub orchestrator: FetchOrchestrator<Value>,
    pub project_url: String,
    pub started_at: DateTime<Utc>,
}

impl ServerState {
    pub fn new(orchestrator: FetchOrchestrator<Value>, project_url: impl Into<String>) -> Self {
        Self {
            orchestrator,
            project_url: project_url.into(),
            started_at: Utc::now(),
        }
    }
}

pub type SharedState = Arc<ServerState>;

/// Create the HTTP router
pub fn create_router(state: SharedState, limiter: Arc<RateLimiter>) -> Router {
    let files = Router::new()
        .route("/{owner}/{repo}/{*filepath}", get(get_file))
        .route_layer(middleware::from_fn_with_state(limiter, rate_limit));

    Router::new()
        .route("/", any(redirect_home))
        .route("/healthz", any(healthz))
        .merge(files)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP server, returning once `shutdown` resolves and connections drain
pub async fn start_server(
    state: SharedState,
    limiter: Arc<RateLimiter>,
    port: u16,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let router = create_router(state, limiter);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}

async fn redirect_home(State(state): State<SharedState>) -> Response {
    (
        StatusCode::FOUND,
        [(header::LOCATION, state.project_url.clone())],
    )
        .into_response()
}

async fn healthz() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// Serve a registry item, from cache when possible
async fn get_file(
    State(state): State<SharedState>,
    method: Method,
    uri: Uri,
    Path((owner, repo, filepath)): Path<(String, String, String)>,
    Query(query): Query<ResolveQuery>,
) -> Result<Response, AppError> {
    if !filepath.ends_with(".json") {
        return Err(AppError::NotFound("not found".to_string()));
    }

    let identity = FileIdentity::new(owner, repo, filepath);
    let force_refresh = query.force_refresh();
    let span = info_span!(
        "resolve",
        http.method = %method,
        http.path = %uri.path(),
        owner = %identity.owner,
        repo = %identity.repo,
        filepath = %identity.filepath,
        force_refresh,
    );

    let result = state
        .orchestrator
        .resolve(&identity, force_refresh)
        .instrument(span.clone())
        .await;

    match result {
        Ok(resolution) => {
            span.in_scope(|| {
                info!(
                    cache = resolution.status.as_header(),
                    http.status = 200,
                    "Served registry item"
                )
            });
            Ok((
                StatusCode::OK,
                [
                    (
                        header::CACHE_CONTROL,
                        format!("public, max-age={}", resolution.max_age.as_secs()),
                    ),
                    (
                        header::HeaderName::from_static("x-cache"),
                        resolution.status.as_header().to_string(),
                    ),
                ],
                Json(resolution.value),
            )
                .into_response())
        }
        Err(ResolveError::NotFound) => {
            span.in_scope(|| info!(http.status = 404, "Registry item not found"));
            Err(AppError::NotFound("file not found".to_string()))
        }
        Err(ResolveError::Transient(msg)) => {
            span.in_scope(|| info!(http.status = 500, "Registry item fetch failed"));
            Err(AppError::Internal(msg))
        }
    }
}
