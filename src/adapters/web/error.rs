//! HTTP error responses: status code plus a JSON `{error, message}` body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::domain::error::LedgerError;

#[derive(Debug)]
pub struct WebError {
    pub status: StatusCode,
    pub error: &'static str,
    pub message: String,
}

impl WebError {
    pub fn new(status: StatusCode, error: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            error,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_request", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "unauthorized", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
    }
}

pub fn status_from_error(err: &LedgerError) -> StatusCode {
    match err {
        LedgerError::UnknownTicker { .. }
        | LedgerError::InvalidShares { .. }
        | LedgerError::InvalidAmount { .. }
        | LedgerError::InvalidPrice { .. }
        | LedgerError::InvalidRequest { .. }
        | LedgerError::InsufficientFunds { .. }
        | LedgerError::InsufficientShares { .. }
        | LedgerError::UnknownHolding { .. } => StatusCode::BAD_REQUEST,
        LedgerError::DuplicateWatchlistEntry { .. }
        | LedgerError::DuplicateUser { .. }
        | LedgerError::Conflict { .. } => StatusCode::CONFLICT,
        LedgerError::NotFound { .. } => StatusCode::NOT_FOUND,
        LedgerError::Forecast { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        LedgerError::ReplayDiverged { .. }
        | LedgerError::Database { .. }
        | LedgerError::DatabaseQuery { .. }
        | LedgerError::MarketData { .. }
        | LedgerError::ConfigParse { .. }
        | LedgerError::ConfigMissing { .. }
        | LedgerError::ConfigInvalid { .. }
        | LedgerError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<LedgerError> for WebError {
    fn from(err: LedgerError) -> Self {
        let status = status_from_error(&err);
        if status.is_server_error() {
            tracing::error!(error = %err, "request failed");
        }
        Self::new(status, err.kind(), err.to_string())
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({
            "error": self.error,
            "message": self.message,
        }));
        (self.status, body).into_response()
    }
}
