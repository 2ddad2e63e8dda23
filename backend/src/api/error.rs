use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::error;

use crate::error::{ErrorKind, ShiftError};

/// JSON body every failing route returns. `error` is the stable taxonomy
/// label clients branch on; `message` is for humans.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
    /// Present only on nozzle-claim conflicts: the contested nozzle codes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nozzles: Option<Vec<String>>,
}

#[derive(Debug)]
pub enum ApiError {
    Shift(ShiftError),
    /// Identity header missing or unparseable; rejected before any work.
    BadHeader(&'static str),
}

impl From<ShiftError> for ApiError {
    fn from(e: ShiftError) -> Self {
        ApiError::Shift(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadHeader(name) => {
                let body = ErrorBody {
                    error: "bad_request",
                    message: format!("missing or malformed header: {name}"),
                    nozzles: None,
                };
                (StatusCode::BAD_REQUEST, Json(body)).into_response()
            }
            ApiError::Shift(e) => {
                let status = match e.kind() {
                    ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
                    ErrorKind::Conflict => StatusCode::CONFLICT,
                    ErrorKind::NotFound => StatusCode::NOT_FOUND,
                    ErrorKind::Forbidden => StatusCode::FORBIDDEN,
                    ErrorKind::Transient => StatusCode::SERVICE_UNAVAILABLE,
                    ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status.is_server_error() {
                    error!(error = %e, "request failed");
                }

                let nozzles = match &e {
                    ShiftError::NozzlesUnavailable { codes } => Some(codes.clone()),
                    _ => None,
                };
                let body = ErrorBody {
                    error: e.kind().as_str(),
                    message: e.to_string(),
                    nozzles,
                };
                (status, Json(body)).into_response()
            }
        }
    }
}
