//! HTTP server mode exposing the fetch pipeline over REST

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::accumulator::collect;
use crate::config::Settings;
use crate::error::{Error, FailureKind, Result};
use crate::fetcher::Fetcher;
use crate::neighbours::{find_star_neighbours, NeighbourOptions, DEFAULT_MIN_SHARED};
use crate::types::{Credential, Identity};

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// Name reported by `/info`
    pub app_name: String,
    /// Deployment environment reported by `/info`
    pub environment: String,
    /// Contact reported by `/info`
    pub admin_email: String,
    /// GitHub account reported by `/info`
    pub github_account: String,
    /// Credential used for every upstream call
    pub credential: Credential,
}

impl ServerConfig {
    /// Server configuration from settings
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            app_name: settings.app_name.clone(),
            environment: settings.environment.clone(),
            admin_email: settings.admin_email.clone(),
            github_account: settings.github_account.clone(),
            credential: Credential::new(settings.github_token.clone()),
        }
    }
}

/// App state shared across handlers
struct AppState {
    config: ServerConfig,
    fetcher: Fetcher,
    shutdown: CancellationToken,
}

/// Query parameters of the neighbours endpoint
#[derive(Debug, Deserialize)]
struct NeighbourQuery {
    #[serde(default)]
    max_stargazers: Option<usize>,
    #[serde(default = "default_min_shared")]
    min_shared: usize,
}

fn default_min_shared() -> usize {
    DEFAULT_MIN_SHARED
}

/// Response wrapper
#[derive(Debug, Serialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn error(msg: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

/// Build the router. Requests are cancelled when `shutdown` fires.
pub fn router(fetcher: Fetcher, config: ServerConfig, shutdown: CancellationToken) -> Router {
    let state = AppState {
        config,
        fetcher,
        shutdown,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/info", get(app_info))
        .route("/rate_limit", get(rate_limit))
        .route("/repos/:owner/:repo/stargazers", get(stargazers))
        .route("/repos/:owner/:repo/starneighbours", get(star_neighbours))
        .route("/users/:user/starred", get(starred))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Start the HTTP server; Ctrl-C stops it and cancels in-flight fetches
pub async fn serve(fetcher: Fetcher, config: ServerConfig, port: u16) -> Result<()> {
    let shutdown = CancellationToken::new();
    let app = router(fetcher, config, shutdown.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::config(format!("Failed to bind to port {port}: {e}")))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if tokio::signal::ctrl_c().await.is_err() {
                warn!("Failed to listen for Ctrl-C; shutting down");
            }
            shutdown.cancel();
        })
        .await
        .map_err(|e| Error::config(format!("Server error: {e}")))?;

    Ok(())
}

/// Map a failed operation to a status code and JSON error body
fn error_response(err: &Error) -> Response {
    let status = match err {
        Error::Fetch(failure) if failure.is_not_found() => StatusCode::NOT_FOUND,
        Error::Fetch(failure) => match failure.kind {
            FailureKind::Fatal => StatusCode::BAD_GATEWAY,
            FailureKind::RetriesExhausted | FailureKind::Cancelled => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        },
        Error::InvalidConfigValue { .. } => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    warn!(status = status.as_u16(), error = %err, "request failed");
    (status, Json(ApiResponse::<()>::error(err.to_string()))).into_response()
}

fn logins(items: Vec<Identity>) -> Vec<String> {
    items.into_iter().map(Identity::into_inner).collect()
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Application metadata
async fn app_info(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(ApiResponse::success(json!({
        "app_name": state.config.app_name,
        "environment": state.config.environment,
        "admin_email": state.config.admin_email,
        "github_account": state.config.github_account,
    })))
}

/// Rate limit snapshot of the server credential
async fn rate_limit(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let status = state.fetcher.rate_limit_status(&state.config.credential);
    Json(ApiResponse::success(status))
}

/// Users who starred a repository
async fn stargazers(
    State(state): State<Arc<AppState>>,
    Path((owner, repo)): Path<(String, String)>,
) -> Response {
    let result = async {
        let stream = state.fetcher.stargazers(
            &owner,
            &repo,
            &state.config.credential,
            state.shutdown.child_token(),
        )?;
        Ok::<_, Error>(collect(stream).await?)
    }
    .await;

    match result {
        Ok(items) => Json(ApiResponse::success(json!({
            "repo": format!("{owner}/{repo}"),
            "stargazers": logins(items),
        })))
        .into_response(),
        Err(e) => error_response(&e),
    }
}

/// Repositories a user starred
async fn starred(State(state): State<Arc<AppState>>, Path(user): Path<String>) -> Response {
    let result = async {
        let stream = state.fetcher.starred(
            &user,
            &state.config.credential,
            state.shutdown.child_token(),
        )?;
        Ok::<_, Error>(collect(stream).await?)
    }
    .await;

    match result {
        Ok(items) => Json(ApiResponse::success(json!({
            "user": user,
            "starred": logins(items),
        })))
        .into_response(),
        Err(e) => error_response(&e),
    }
}

/// Repositories co-starred by a repository's stargazers
async fn star_neighbours(
    State(state): State<Arc<AppState>>,
    Path((owner, repo)): Path<(String, String)>,
    Query(query): Query<NeighbourQuery>,
) -> Response {
    let options = NeighbourOptions {
        max_stargazers: query.max_stargazers,
        min_shared: query.min_shared,
    };
    let result = find_star_neighbours(
        &state.fetcher,
        &owner,
        &repo,
        &state.config.credential,
        options,
        state.shutdown.child_token(),
    )
    .await;

    match result {
        Ok(neighbours) => Json(ApiResponse::success(neighbours)).into_response(),
        Err(e) => error_response(&e),
    }
}
