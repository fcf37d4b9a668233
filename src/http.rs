//! HTTP surface of the render service.
//!
//! Routes:
//! - `GET /` — service identity
//! - `GET /health`, `GET /healthz` — liveness for external probes
//! - `POST /render` — synchronous render; the response body is the finished
//!   MP4, errors are JSON with a status code per failure kind
//!
//! Every failure is recovered here and mapped to a response; a render job can
//! never take the serving process down with it.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};

use crate::config::LimitsConfig;
use crate::error::RenderError;
use crate::pool::RenderPool;
use crate::render::{RenderRequest, Renderer};
use crate::runner::stderr_tail;

/// How much captured ffmpeg stderr a client gets back on tool failure.
const STDERR_TAIL_BYTES: usize = 4096;

#[derive(Clone)]
pub struct AppState {
    pub pool: RenderPool,
    pub renderer: Arc<Renderer>,
    pub limits: LimitsConfig,
}

#[derive(Serialize)]
struct ServiceInfo {
    ok: bool,
    service: &'static str,
}

#[derive(Serialize)]
struct ErrorBody {
    status: &'static str,
    kind: &'static str,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    stderr: Option<String>,
}

impl IntoResponse for RenderError {
    fn into_response(self) -> Response {
        let (status, kind, stderr) = match &self {
            RenderError::Validation(_) => (StatusCode::BAD_REQUEST, "validation", None),
            RenderError::Capacity => (StatusCode::SERVICE_UNAVAILABLE, "capacity", None),
            RenderError::Fetch { .. } => (StatusCode::BAD_GATEWAY, "fetch", None),
            RenderError::Materialization(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "materialization", None)
            }
            RenderError::Launch { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "launch", None),
            RenderError::ToolFailed { stderr, .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "ffmpeg",
                Some(stderr_tail(stderr, STDERR_TAIL_BYTES).to_string()),
            ),
            RenderError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout", None),
            RenderError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal", None),
        };
        let body = ErrorBody {
            status: "error",
            kind,
            error: self.to_string(),
            stderr,
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let max_body = state.limits.max_body_bytes;
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/healthz", get(health_handler))
        .route("/render", post(render_handler))
        .layer(DefaultBodyLimit::max(max_body))
        .layer(cors)
        .with_state(state)
}

/// Bind and serve until the shutdown token fires; in-flight renders finish
/// before the process exits.
pub async fn serve(
    addr: SocketAddr,
    state: AppState,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let app = router(state);

    tracing::info!(addr = %addr, "Starting render server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

async fn root_handler() -> impl IntoResponse {
    Json(ServiceInfo {
        ok: true,
        service: "renderd",
    })
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn render_handler(
    State(state): State<AppState>,
    payload: Result<Json<RenderRequest>, JsonRejection>,
) -> Result<Response, RenderError> {
    let Json(request) =
        payload.map_err(|rejection| RenderError::Validation(rejection.body_text()))?;
    request.validate(&state.limits)?;

    // Slot is held until this handler returns; the workspace is cleaned
    // inside render() first, so teardown order is artifacts, then slot.
    let _slot = state.pool.try_acquire()?;

    let media = state.renderer.render(&request).await?;
    let headers = [
        ("content-type", "video/mp4".to_string()),
        ("x-render-width", media.width.to_string()),
        ("x-render-height", media.height.to_string()),
        ("x-render-fps", media.fps.to_string()),
        ("x-render-scenes", media.scenes.to_string()),
    ];
    Ok((StatusCode::OK, headers, media.bytes).into_response())
}
