use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::config::ConfigError;
use crate::registry::service::MembershipError;
use crate::rewards::ledger::RewardsError;
use crate::rewards::roster::RosterImportError;
use crate::telemetry::TelemetryError;

/// Coarse failure classification shared by the domain services.
///
/// Services expose `kind()` on their error enums so the HTTP and CLI
/// surfaces can map failures without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    NotFound,
    Validation,
    Conflict,
    Integrity,
    Unavailable,
}

impl FaultKind {
    pub const fn status_code(self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Validation => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Conflict => StatusCode::CONFLICT,
            Self::Integrity | Self::Unavailable => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Top-level error for the binary surfaces.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("server error: {0}")]
    Server(#[from] axum::Error),
    #[error("membership error: {0}")]
    Membership(#[from] MembershipError),
    #[error("rewards error: {0}")]
    Rewards(#[from] RewardsError),
    #[error("roster import error: {0}")]
    Roster(#[from] RosterImportError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Membership(err) => err.kind().status_code(),
            AppError::Rewards(err) => err.kind().status_code(),
            AppError::Roster(_) => StatusCode::BAD_REQUEST,
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
