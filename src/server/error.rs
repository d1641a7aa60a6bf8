use super::pairing::PairingError;
use crate::config::ConfigError;
use crate::queue::ControllerError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

pub type ServerResult<T> = Result<T, ServerError>;

/// Failures starting or running the HTTP listener
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid bind address {address}: {source}")]
    InvalidAddress {
        address: String,
        source: std::net::AddrParseError,
    },

    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    #[error("HTTP server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Per-request failures, rendered as `{"detail": ...}`
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Missing or invalid auth token")]
    Unauthorized,

    #[error("Client address not allowed")]
    Forbidden,

    #[error(transparent)]
    Controller(#[from] ControllerError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Pairing(#[from] PairingError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::Controller(ControllerError::InvalidTransition { .. }) => StatusCode::CONFLICT,
            ApiError::Controller(ControllerError::ChannelClosed) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Config(ConfigError::Validation { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Config(_) | ApiError::Pairing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "detail": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}
