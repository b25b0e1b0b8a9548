//! Error taxonomy shared by the stores, the services and the HTTP layer.

use actix_web::http::{StatusCode, header};
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PanelError>;

#[derive(Error, Debug)]
pub enum PanelError {
    #[error("Failed to read config file '{}': {source}", path.display())]
    ConfigRead { path: PathBuf, source: std::io::Error },

    #[error("Failed to parse config file '{}': {source}", path.display())]
    ConfigParse { path: PathBuf, source: toml::de::Error },

    #[error("Failed to write config file '{}': {source}", path.display())]
    ConfigWrite { path: PathBuf, source: std::io::Error },

    #[error("Failed to encode config: {0}")]
    ConfigEncode(#[from] toml::ser::Error),

    #[error("Invalid panel settings: {0}")]
    Settings(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Login required")]
    Unauthenticated,

    #[error("Invalid password")]
    InvalidCredentials,

    #[error("Invalid CSRF token")]
    CsrfRejected,

    #[error("Service command '{command}' failed: {reason}")]
    Subprocess { command: String, reason: String },

    #[error("Service command '{command}' timed out after {secs}s")]
    Timeout { command: String, secs: u64 },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PanelError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn internal(msg: impl ToString) -> Self {
        Self::Internal(msg.to_string())
    }

    /// Message sent to the browser. File paths and io errors stay in the log.
    pub fn public_message(&self) -> String {
        match self {
            Self::ConfigRead { .. } | Self::ConfigParse { .. } => "Failed to load configuration".to_string(),
            Self::ConfigWrite { .. } | Self::ConfigEncode(_) => "Failed to save configuration".to_string(),
            Self::Subprocess { .. } => "Service command failed".to_string(),
            Self::Timeout { .. } => "Service command timed out".to_string(),
            Self::Settings(_) | Self::Internal(_) => "Internal error".to_string(),
            other => other.to_string(),
        }
    }
}

impl ResponseError for PanelError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::Conflict(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthenticated => StatusCode::FOUND,
            Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::CsrfRejected => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let Self::Unauthenticated = self {
            return HttpResponse::Found().insert_header((header::LOCATION, "/login")).finish();
        }
        HttpResponse::build(self.status_code()).json(json!({ "error": self.public_message() }))
    }
}
