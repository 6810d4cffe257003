use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use relay_app::{ApiError, AppError};

/// JSON error envelope for the loopback API. Wraps the app-level `ApiError`
/// shape so orchestrator failures and route-level rejections render the same.
#[derive(Debug)]
pub struct HttpError(ApiError);

impl HttpError {
    /// A source key that is not part of the tracked set.
    pub fn unknown_source(key: &str) -> Self {
        Self(ApiError {
            status: StatusCode::NOT_FOUND.as_u16(),
            message: format!("unknown source {key}"),
            code: Some("unknown_source".to_string()),
        })
    }
}

impl From<AppError> for HttpError {
    fn from(err: AppError) -> Self {
        Self(ApiError::from(err))
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.0)).into_response()
    }
}
