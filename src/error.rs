use crate::extractor::ExtractError;
use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;

/// Which request an extraction failure belongs to; picks the user-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Info,
    Download,
}

// Define our custom error type
#[derive(Debug)]
pub enum AppError {
    Internal(anyhow::Error),
    Extract(Stage, ExtractError),
    BadRequest(String),
    NotFound(String),
}

impl AppError {
    fn parts(&self) -> (StatusCode, String, Option<String>, bool) {
        match self {
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An internal server error occurred".to_string(),
                None,
                false,
            ),
            AppError::Extract(stage, e) => {
                let generic = match stage {
                    Stage::Info => "Could not fetch details",
                    Stage::Download => "Could not download",
                };
                let (status, message) = match e {
                    ExtractError::Timeout(_) => {
                        (StatusCode::GATEWAY_TIMEOUT, format!("{}: the request timed out", generic))
                    }
                    ExtractError::Unresolved(_) => (
                        StatusCode::NOT_FOUND,
                        "Download unavailable for the selected quality".to_string(),
                    ),
                    _ => (StatusCode::BAD_GATEWAY, generic.to_string()),
                };
                (status, message, Some(e.to_string()), e.is_retryable())
            }
            AppError::BadRequest(e) => (StatusCode::BAD_REQUEST, e.clone(), None, false),
            AppError::NotFound(e) => (StatusCode::NOT_FOUND, e.clone(), None, false),
        }
    }
}

// This implementation allows us to convert our AppError into a valid HTTP response.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Internal(e) => tracing::error!("Internal server error: {:?}", e),
            AppError::Extract(stage, e) => tracing::error!("yt-dlp {:?} call failed: {}", stage, e),
            _ => {}
        }

        let (status, error_message, detail, retryable) = self.parts();
        let body = Json(json!({
            "error": error_message,
            "detail": detail,
            "retryable": retryable,
        }));
        (status, body).into_response()
    }
}

// This allows us to use the `?` operator to automatically convert
// any error that implements `std::error::Error` into our `AppError::Internal`.
impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::Internal(err.into())
    }
}
