use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("Headless API error: {0}")]
    CaptureFailed(String),

    /// Body sent back to the caller; `status` mirrors the blob store's reply.
    #[error("{}", upload_message(.detail))]
    UploadFailed {
        status: StatusCode,
        detail: Option<String>,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

fn upload_message(detail: &Option<String>) -> String {
    match detail {
        Some(detail) => format!("Upload failed: {detail}"),
        None => "Upload failed".to_string(),
    }
}

impl CacheError {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            CacheError::UploadFailed { .. } => ErrorSeverity::Medium,
            CacheError::CaptureFailed(_) | CacheError::Transport(_) => ErrorSeverity::High,
            CacheError::Configuration(_) => ErrorSeverity::Critical,
            CacheError::Io(_) | CacheError::Serialization(_) => ErrorSeverity::Low,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// Early terminals of the request router. No collaborator is contacted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RequestRejection {
    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Missing path")]
    MissingPath,
}

impl RequestRejection {
    pub fn status(&self) -> StatusCode {
        match self {
            RequestRejection::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            RequestRejection::MissingPath => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<reqwest::Error> for CacheError {
    fn from(err: reqwest::Error) -> Self {
        CacheError::Transport(err.to_string())
    }
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}
