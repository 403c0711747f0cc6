use serde::{Serialize, Deserialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ErrorCode {
    #[error("No active poll")]
    NoActivePoll,
    #[error("Submission limit reached")]
    SubmissionCapExceeded,
    #[error("Storage failure")]
    StorageFailure,
    #[error("Resource not found")]
    NotFound,
    #[error("Resource conflict")]
    Conflict,
    #[error("Invalid input provided")]
    InvalidInput,
    #[error("Operation not authorized")]
    Unauthorized,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: ErrorCode,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(details) = &self.details {
            write!(f, "{}: {} ({})", self.code, self.message, details)
        } else {
            write!(f, "{}: {}", self.code, self.message)
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(code: ErrorCode, message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: Some(details.into()),
        }
    }

    pub fn no_active_poll(club_id: impl fmt::Display) -> Self {
        Self::new(ErrorCode::NoActivePoll, format!("Club {} has no open poll", club_id))
    }

    pub fn storage(details: impl Into<String>) -> Self {
        Self::with_details(ErrorCode::StorageFailure, "Storage operation failed", details)
    }

    pub fn is(&self, code: ErrorCode) -> bool {
        self.code == code
    }

    pub fn response(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.to_string(),
            code: self.code,
        }
    }
}

impl From<crate::validation::ValidationError> for Error {
    fn from(e: crate::validation::ValidationError) -> Self {
        Self::new(ErrorCode::InvalidInput, e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
