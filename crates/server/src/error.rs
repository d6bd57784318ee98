use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use baywatch_core::error::{ApiError, ErrorEnvelope, NavError};
use baywatch_db::DbError;
use tracing::error;

/// Newtype wrapper so we can implement `IntoResponse` in this crate.
pub struct AppError(pub ApiError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        }
        let envelope = ErrorEnvelope::from(&self.0);
        (status, Json(envelope)).into_response()
    }
}

impl From<ApiError> for AppError {
    fn from(e: ApiError) -> Self {
        Self(e)
    }
}

impl From<NavError> for AppError {
    fn from(e: NavError) -> Self {
        Self(e.into())
    }
}

impl From<DbError> for AppError {
    fn from(e: DbError) -> Self {
        Self(ApiError::Internal(e.to_string()))
    }
}
