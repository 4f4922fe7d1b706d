use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::alerts::ClearanceError;

/// Reasons an API request may fail, mapped onto HTTP statuses and stable
/// machine-readable error codes.
#[derive(Debug, thiserror::Error)]
pub enum Rejection {
    #[error("unknown vehicle '{0}'")]
    UnknownVehicle(String),

    #[error("unknown alert kind '{0}'")]
    UnknownAlertKind(String),

    #[error(transparent)]
    Clearance(#[from] ClearanceError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl Rejection {
    pub(crate) fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Rejection::UnknownVehicle(_) => (StatusCode::NOT_FOUND, "unknown_vehicle"),
            Rejection::UnknownAlertKind(_) => (StatusCode::NOT_FOUND, "unknown_alert_kind"),
            Rejection::Clearance(ClearanceError::EmptyJustification) => {
                (StatusCode::BAD_REQUEST, "empty_justification")
            }
            Rejection::Clearance(ClearanceError::UnknownVehicle(_)) => {
                (StatusCode::NOT_FOUND, "unknown_vehicle")
            }
            // Distinct code: the dismissal did NOT take effect and the UI
            // must say so.
            Rejection::Clearance(ClearanceError::Unaccounted { .. }) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "clearance_unaccounted")
            }
            Rejection::Clearance(_) => (StatusCode::INTERNAL_SERVER_ERROR, "clearance_failed"),
            Rejection::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code, "api request failed");
        }
        let body = Json(serde_json::json!({
            "error": code,
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}
