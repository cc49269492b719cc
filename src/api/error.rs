use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// The backend answered, but not with success.
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Failure body returned by the backend, either a JSON object carrying an
/// `error` field or free text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorBody {
    Structured { message: String },
    Plain { message: String },
}

#[derive(Deserialize)]
struct StructuredBody {
    error: String,
}

impl ErrorBody {
    pub fn parse(body: &str) -> Self {
        let body = body.trim();
        match serde_json::from_str::<StructuredBody>(body) {
            Ok(structured) => ErrorBody::Structured {
                message: Self::truncate_body(structured.error.trim()),
            },
            Err(_) => ErrorBody::Plain {
                message: Self::truncate_body(body),
            },
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ErrorBody::Structured { message } | ErrorBody::Plain { message } => message,
        }
    }

    pub fn into_message(self) -> String {
        match self {
            ErrorBody::Structured { message } | ErrorBody::Plain { message } => message,
        }
    }

    /// Truncate a response body to avoid displaying excessive data
    fn truncate_body(body: &str) -> String {
        if body.chars().count() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let head: String = body.chars().take(MAX_ERROR_BODY_LENGTH).collect();
            format!("{}... (truncated, {} total bytes)", head, body.len())
        }
    }
}

impl ApiError {
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = ErrorBody::parse(body).into_message();
        let message = if message.trim().is_empty() {
            format!("Request failed with status {}", status)
        } else {
            message
        };
        ApiError::Rejected { status, message }
    }

    /// Message suitable for showing next to the login form
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Rejected { message, .. } => message.clone(),
            ApiError::NetworkError(e) if e.is_timeout() => {
                "Connection timed out. Please try again.".to_string()
            }
            ApiError::NetworkError(e) if e.is_connect() => {
                "Unable to connect to server. Check your network connection.".to_string()
            }
            ApiError::NetworkError(e) => format!("Request failed: {}", e),
            ApiError::InvalidResponse(msg) => format!("Unexpected server response: {}", msg),
        }
    }
}
