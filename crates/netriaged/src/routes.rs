//! API routes for netriaged

use crate::server::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use netriage_common::rpc::{
    AnalyzeCommandRequest, CaptureRequest, CaptureResponse, ErrorBody, HealthResponse,
    IngestRequest, IngestResponse, JobView, StartRequest, StartResponse,
};
use netriage_common::{ErrorKind, SessionSnapshot, TriageError, VERSION};
use std::sync::Arc;
use tracing::{error, info, warn};

type AppStateArc = Arc<AppState>;

/// Request error carried to the HTTP layer as `{kind, message}`.
#[derive(Debug)]
pub struct ApiError(pub TriageError);

impl From<TriageError> for ApiError {
    fn from(err: TriageError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self.0.kind() {
            ErrorKind::InvalidScope | ErrorKind::InvalidHost | ErrorKind::InvalidCommand => {
                StatusCode::BAD_REQUEST
            }
            ErrorKind::UnknownSession | ErrorKind::UnknownJob | ErrorKind::NotCaptured => {
                StatusCode::NOT_FOUND
            }
            ErrorKind::SessionClosed => StatusCode::CONFLICT,
            ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::Io | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("  Request failed: {}", self.0);
        } else {
            warn!("  Request rejected: {}", self.0);
        }
        (status, Json(ErrorBody::from(&self.0))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

// ============================================================================
// Triage Routes
// ============================================================================

pub fn triage_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/triage/start", post(start_session))
        .route("/triage/ingest", post(ingest))
        .route("/triage/analyze_command", post(analyze_command))
        .route("/triage/:session_id", get(session_snapshot))
}

async fn start_session(
    State(state): State<AppStateArc>,
    Json(req): Json<StartRequest>,
) -> ApiResult<StartResponse> {
    info!("  Starting session on {} for {:?}", req.scope, req.hosts);
    let resp = state.manager.start(&req.scope, &req.hosts).await?;
    Ok(Json(resp))
}

async fn ingest(
    State(state): State<AppStateArc>,
    Json(req): Json<IngestRequest>,
) -> ApiResult<IngestResponse> {
    info!("  Ingest for {}: {}", req.session_id, req.user_text);
    let resp = state.manager.ingest(&req.session_id, &req.user_text).await?;
    Ok(Json(resp))
}

async fn analyze_command(
    State(state): State<AppStateArc>,
    Json(req): Json<AnalyzeCommandRequest>,
) -> ApiResult<IngestResponse> {
    info!(
        "  Analyze for {}: '{}' on {}",
        req.session_id, req.command, req.host
    );
    let resp = state
        .manager
        .analyze_command(&req.session_id, &req.host, &req.command)
        .await?;
    Ok(Json(resp))
}

async fn session_snapshot(
    State(state): State<AppStateArc>,
    Path(session_id): Path<String>,
) -> ApiResult<SessionSnapshot> {
    Ok(Json(state.manager.snapshot(&session_id).await?))
}

// ============================================================================
// Capture Routes
// ============================================================================

pub fn capture_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/capture", post(submit_capture))
        .route("/capture/:job_id", get(job_status))
        .route("/capture/:job_id/retry", post(retry_capture))
}

async fn submit_capture(
    State(state): State<AppStateArc>,
    Json(req): Json<CaptureRequest>,
) -> ApiResult<CaptureResponse> {
    info!(
        "  Capture on {}/{}: {} commands",
        req.scope,
        req.host,
        req.commands.len()
    );
    let resp = state
        .dispatcher
        .submit(&req.scope, &req.host, &req.commands)?;
    Ok(Json(resp))
}

async fn job_status(
    State(state): State<AppStateArc>,
    Path(job_id): Path<String>,
) -> ApiResult<JobView> {
    let job = state.dispatcher.get(&job_id)?;
    Ok(Json(JobView::from(&job)))
}

async fn retry_capture(
    State(state): State<AppStateArc>,
    Path(job_id): Path<String>,
) -> ApiResult<CaptureResponse> {
    info!("  Retrying job {}", job_id);
    Ok(Json(state.dispatcher.retry(&job_id)?))
}

// ============================================================================
// Health Routes
// ============================================================================

pub fn health_routes() -> Router<AppStateArc> {
    Router::new().route("/health", get(health_check))
}

async fn health_check(State(state): State<AppStateArc>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: VERSION.to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        sessions: state.manager.session_count().await,
        jobs: state.dispatcher.job_count(),
    })
}
