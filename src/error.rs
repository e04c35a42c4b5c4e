use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// The application's error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// The login token could not be opened.
    #[error("Token decryption failed: {0}")]
    TokenDecryption(String),

    /// The backend did not return a usable session.
    #[error("Session fetch failed: {0}")]
    SessionFetch(String),

    /// The backend did not confirm the logout.
    #[error("Logout failed: {0}")]
    Logout(String),

    /// An authorization error.
    #[error("Authorization failed")]
    Unauthorized,

    /// A validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A backend collaborator endpoint rejected the request.
    #[error("Backend error: {0}")]
    Backend(String),

    /// A transport error talking to the backend.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An internal server error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// A `Result` type that uses `AppError` as the error type.
pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::TokenDecryption(ref msg) => {
                tracing::warn!("Token decryption failed: {}", msg);
                (StatusCode::UNAUTHORIZED, "Invalid login token".to_string())
            }

            AppError::SessionFetch(ref msg) => {
                tracing::warn!("Session fetch failed: {}", msg);
                (StatusCode::UNAUTHORIZED, "No active session".to_string())
            }

            AppError::Logout(ref msg) => {
                tracing::warn!("Logout failed: {}", msg);
                (StatusCode::BAD_GATEWAY, "Logout failed".to_string())
            }

            AppError::Unauthorized => {
                tracing::warn!("Authorization failed");
                (StatusCode::FORBIDDEN, "Forbidden".to_string())
            }

            AppError::Validation(ref msg) => {
                tracing::debug!("Validation error: {}", msg);
                (StatusCode::BAD_REQUEST, msg.clone())
            }

            AppError::Backend(ref msg) => {
                tracing::warn!("Backend error: {}", msg);
                (StatusCode::BAD_GATEWAY, msg.clone())
            }

            AppError::Http(ref e) => {
                tracing::error!("HTTP error: {}", e);
                (StatusCode::BAD_GATEWAY, "Backend unavailable".to_string())
            }

            AppError::Config(ref msg) => {
                tracing::error!("Configuration error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }

            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = sonic_rs::to_string(&sonic_rs::json!({
            "error": message
        }))
        .unwrap_or_else(|_| r#"{"error":"Internal server error"}"#.to_string());

        (status, [(http::header::CONTENT_TYPE, "application/json")], body).into_response()
    }
}
