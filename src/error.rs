use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("OAuth2 authentication error: {0}")]
    Auth(String),

    #[error(
        "Credentials file not found at {0:?}. Download an OAuth client ID (desktop app) from the Google Cloud Console."
    )]
    CredentialsMissing(PathBuf),

    #[error("Credentials at {path:?} could not be read: {reason}")]
    CredentialsCorrupt { path: PathBuf, reason: String },

    #[error("Rate limit exceeded after {attempts} attempts: {status} - {detail}")]
    RateLimited {
        attempts: u32,
        status: u16,
        detail: String,
    },

    #[error("Service unavailable after {attempts} attempts: {status} - {detail}")]
    ServiceUnavailable {
        attempts: u32,
        status: u16,
        detail: String,
    },

    #[error("Request rejected: {status} - {detail}")]
    RequestRejected { status: u16, detail: String },

    #[error("Invalid A1 range: {0}")]
    InvalidRangeSpec(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Google Sheets API error: {0}")]
    Sheets(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Closed classification of failures surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    Authentication,
    RateLimited,
    ServiceUnavailable,
    RequestRejected,
    InvalidRange,
    InvalidArgument,
    Transport,
    Internal,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Authentication => "AUTHENTICATION",
            FailureKind::RateLimited => "RATE_LIMITED",
            FailureKind::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            FailureKind::RequestRejected => "REQUEST_REJECTED",
            FailureKind::InvalidRange => "INVALID_RANGE",
            FailureKind::InvalidArgument => "INVALID_ARGUMENT",
            FailureKind::Transport => "TRANSPORT",
            FailureKind::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AppError {
    pub fn kind(&self) -> FailureKind {
        match self {
            AppError::Auth(_)
            | AppError::CredentialsMissing(_)
            | AppError::CredentialsCorrupt { .. } => FailureKind::Authentication,
            AppError::RateLimited { .. } => FailureKind::RateLimited,
            AppError::ServiceUnavailable { .. } => FailureKind::ServiceUnavailable,
            AppError::RequestRejected { .. } => FailureKind::RequestRejected,
            AppError::InvalidRangeSpec(_) => FailureKind::InvalidRange,
            AppError::InvalidArgument(_) => FailureKind::InvalidArgument,
            AppError::Http(_) => FailureKind::Transport,
            AppError::Sheets(_)
            | AppError::Config(_)
            | AppError::Serialization(_)
            | AppError::Io(_) => FailureKind::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_failures_classify_as_authentication() {
        let missing = AppError::CredentialsMissing(PathBuf::from("/tmp/credentials.json"));
        let corrupt = AppError::CredentialsCorrupt {
            path: PathBuf::from("/tmp/token.json"),
            reason: "expected value".to_string(),
        };

        assert_eq!(missing.kind(), FailureKind::Authentication);
        assert_eq!(corrupt.kind(), FailureKind::Authentication);
        assert_eq!(
            AppError::Auth("declined".to_string()).kind(),
            FailureKind::Authentication
        );
    }

    #[test]
    fn test_retry_exhaustion_keeps_status_and_detail() {
        let err = AppError::RateLimited {
            attempts: 3,
            status: 429,
            detail: "Quota exceeded".to_string(),
        };

        assert_eq!(err.kind(), FailureKind::RateLimited);
        assert_eq!(
            err.to_string(),
            "Rate limit exceeded after 3 attempts: 429 - Quota exceeded"
        );
    }

    #[test]
    fn test_failure_kind_rendering() {
        assert_eq!(FailureKind::ServiceUnavailable.to_string(), "SERVICE_UNAVAILABLE");
        assert_eq!(
            serde_json::to_value(FailureKind::InvalidRange).unwrap(),
            serde_json::json!("INVALID_RANGE")
        );
    }
}
