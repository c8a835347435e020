//! Health handlers

use apigw_core::{HealthProbeResult, HealthVerdict};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{ApiError, RequestMeta};
use crate::state::AppState;

#[derive(Serialize)]
pub struct LivenessResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    /// Seconds since gateway start
    pub uptime: f64,
}

#[derive(Serialize)]
pub struct DetailedHealthResponse {
    #[serde(flatten)]
    pub verdict: HealthVerdict,
    pub timestamp: DateTime<Utc>,
    pub uptime: f64,
}

fn status(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// GET /health
pub async fn liveness(State(state): State<AppState>) -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: "healthy",
        timestamp: Utc::now(),
        uptime: state.uptime_secs(),
    })
}

/// GET /health/detailed
pub async fn detailed(State(state): State<AppState>) -> (StatusCode, Json<DetailedHealthResponse>) {
    let verdict = state.aggregator().aggregate_all().await;
    let code = status(verdict.http_status_code());
    (
        code,
        Json(DetailedHealthResponse {
            verdict,
            timestamp: Utc::now(),
            uptime: state.uptime_secs(),
        }),
    )
}

/// GET /health/service/{name}
pub async fn service(
    State(state): State<AppState>,
    Path(name): Path<String>,
    meta: RequestMeta,
) -> Result<(StatusCode, Json<HealthProbeResult>), ApiError> {
    let result = state
        .aggregator()
        .probe_one(&name)
        .await
        .map_err(|e| ApiError::new(e.into(), meta))?;
    Ok((status(result.http_status_code()), Json(result)))
}
