use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use drive_score::config::ScoringConfig;
use drive_score::error::AppError;
use drive_score::ingest::MovementReportImporter;
use drive_score::scoring::{ScoreOutcome, ScoringEngine, SuppressionMode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::io::Cursor;

#[derive(Debug, Deserialize)]
pub(crate) struct ScoreRequest {
    pub(crate) report_csv: String,
    #[serde(default)]
    pub(crate) full_month: Option<bool>,
    #[serde(default)]
    pub(crate) default_speed_limit: Option<u32>,
    #[serde(default)]
    pub(crate) min_gap: Option<bool>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ScoreResponse {
    pub(crate) vehicle: Option<String>,
    pub(crate) outcome: ScoreOutcome,
}

pub(crate) fn router() -> axum::Router {
    axum::Router::new()
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route("/api/v1/score", axum::routing::post(score_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Scores an uploaded report against the default limit. Posted-limit lookups
/// need operator confirmation and are only offered on the command line.
pub(crate) async fn score_endpoint(
    Extension(defaults): Extension<ScoringConfig>,
    Json(payload): Json<ScoreRequest>,
) -> Result<Json<ScoreResponse>, AppError> {
    let ScoreRequest {
        report_csv,
        full_month,
        default_speed_limit,
        min_gap,
    } = payload;

    let mut scoring = defaults;
    scoring.use_speed_lookup = false;
    if let Some(full_month) = full_month {
        scoring.full_month = full_month;
    }
    if let Some(limit) = default_speed_limit {
        scoring.default_speed_limit = limit;
    }
    if let Some(min_gap) = min_gap {
        scoring.suppression = if min_gap {
            SuppressionMode::MinimumGap
        } else {
            SuppressionMode::PredecessorDelta
        };
    }

    let movement = MovementReportImporter::from_reader(Cursor::new(report_csv.into_bytes()))?;
    let outcome = ScoringEngine::new(scoring.policy(false)).score_source(&movement, None)?;

    Ok(Json(ScoreResponse {
        vehicle: movement.vehicle,
        outcome,
    }))
}
