//! Typed errors for the SwiftFlow backend.
//!
//! - `ApiError`: what an HTTP handler returns; maps onto a status code and
//!   a JSON body
//! - `ConfigError`: invalid configuration file or environment values

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Errors surfaced by the HTTP API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{message}")]
    Internal { kind: &'static str, message: String },
}

impl ApiError {
    /// Wrap an unexpected failure, naming its kind for the response body.
    pub fn internal(context: &str, err: anyhow::Error) -> Self {
        let kind = if err.chain().any(|c| c.is::<rusqlite::Error>()) {
            "DatabaseError"
        } else if err.chain().any(|c| c.is::<tokio::task::JoinError>()) {
            "TaskFailed"
        } else {
            "InternalError"
        };
        tracing::error!(error = format!("{:#}", err), kind, "{}", context);
        ApiError::Internal {
            kind,
            message: format!("{}: {}", context, err),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Internal { kind, message } => serde_json::json!({
                "message": message,
                "error": kind,
                "status": status.as_u16(),
            }),
            other => serde_json::json!({
                "message": other.to_string(),
                "status": status.as_u16(),
            }),
        };
        (status, Json(body)).into_response()
    }
}

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {source}")]
    Read {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: std::path::PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value '{value}' for {key}: {message}")]
    InvalidValue {
        key: String,
        value: String,
        message: String,
    },
}
