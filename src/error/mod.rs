//! Error handling module

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("No token specified in configuration for Wireless Sensor Tags")]
    MissingToken,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Malformed response: {0}")]
    DecodeError(String),

    #[error("Host registration failed: {0}")]
    HostError(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<config::ConfigError> for BridgeError {
    fn from(e: config::ConfigError) -> Self {
        BridgeError::ConfigError(e.to_string())
    }
}

impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        let status = match &self {
            BridgeError::NotFound(_) => StatusCode::NOT_FOUND,
            BridgeError::HttpError(_)
            | BridgeError::UnexpectedStatus { .. }
            | BridgeError::DecodeError(_) => StatusCode::BAD_GATEWAY,
            BridgeError::MissingToken
            | BridgeError::ConfigError(_)
            | BridgeError::HostError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}
