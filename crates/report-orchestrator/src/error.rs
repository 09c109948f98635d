//! Error types for the report orchestrator

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for orchestrator operations
pub type Result<T> = std::result::Result<T, Error>;

/// Report orchestrator errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Request document is malformed or does not start with the envelope
    #[error("Malformed request document: {0}")]
    DocumentFormat(String),

    /// Requesting user is not on the report's access list
    #[error("User '{user}' is not authorized to run report '{report}'")]
    AuthorizationDenied { user: String, report: String },

    /// One or more recipients are on the banned list
    #[error("Banned recipients present: {}", removed.join(", "))]
    BannedRecipients { removed: Vec<String> },

    /// The report class has no registered implementation
    #[error("Report class not found: {0}")]
    ReportClassNotFound(String),

    /// The report implementation failed
    #[error("Report execution failed: {0}")]
    ReportExecution(String),

    /// One or more artifacts could not be delivered
    #[error("Delivery failed: {0}")]
    Delivery(String),

    /// Mail transport error
    #[error("Mail error: {0}")]
    Mail(String),

    /// File transfer error
    #[error("File transfer error: {0}")]
    Transfer(String),

    /// Message broker error
    #[error("Broker error: {0}")]
    Broker(String),

    /// Job is not in the active registry
    #[error("Job not found: {0}")]
    JobNotFound(u64),

    /// Operation not valid in the current lifecycle state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Archive error
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// CSV writer error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a document format error
    pub fn document(message: impl Into<String>) -> Self {
        Self::DocumentFormat(message.into())
    }

    /// Create a report execution error
    pub fn execution(message: impl Into<String>) -> Self {
        Self::ReportExecution(message.into())
    }

    /// Create a delivery error
    pub fn delivery(message: impl Into<String>) -> Self {
        Self::Delivery(message.into())
    }

    /// Create a mail error
    pub fn mail(message: impl Into<String>) -> Self {
        Self::Mail(message.into())
    }

    /// Create a file transfer error
    pub fn transfer(message: impl Into<String>) -> Self {
        Self::Transfer(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl From<lapin::Error> for Error {
    fn from(err: lapin::Error) -> Self {
        Error::Broker(err.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            Error::Config(_) => (StatusCode::BAD_REQUEST, "config_error"),
            Error::DocumentFormat(_) => (StatusCode::BAD_REQUEST, "document_error"),
            Error::AuthorizationDenied { .. } => (StatusCode::FORBIDDEN, "authorization_denied"),
            Error::BannedRecipients { .. } => (StatusCode::FORBIDDEN, "banned_recipients"),
            Error::ReportClassNotFound(_) => (StatusCode::NOT_FOUND, "report_not_found"),
            Error::JobNotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Error::InvalidState(_) => (StatusCode::CONFLICT, "invalid_state"),
            Error::Broker(_) | Error::Http(_) => (StatusCode::BAD_GATEWAY, "upstream_error"),
            Error::ReportExecution(_)
            | Error::Delivery(_)
            | Error::Mail(_)
            | Error::Transfer(_)
            | Error::Database(_)
            | Error::Zip(_)
            | Error::Csv(_)
            | Error::Io(_)
            | Error::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}
