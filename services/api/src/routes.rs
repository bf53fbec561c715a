use std::io::Cursor;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::json;
use ward_registry::error::AppError;
use ward_registry::registry::registry_router;
use ward_registry::rewards::{rewards_router, RosterOutcome};

use crate::infra::{AppState, RosterImporter, WardServices};

/// Achievement roster posted as inline CSV text, the way the schools hand
/// it over.
#[derive(Debug, Deserialize)]
pub(crate) struct RosterImportRequest {
    pub(crate) csv: String,
}

pub(crate) fn ward_routes(services: &WardServices) -> axum::Router {
    registry_router(services.membership.clone())
        .merge(rewards_router(services.rewards.clone()))
        .route(
            "/api/v1/rewards/roster/import",
            axum::routing::post(roster_import_endpoint).with_state(services.importer.clone()),
        )
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
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

pub(crate) async fn roster_import_endpoint(
    State(importer): State<Arc<RosterImporter>>,
    Json(payload): Json<RosterImportRequest>,
) -> Result<Json<RosterOutcome>, AppError> {
    let outcome = importer.from_reader(Cursor::new(payload.csv.into_bytes()))?;
    Ok(Json(outcome))
}
