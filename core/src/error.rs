//! Error types for the forum API client.
//!
//! # Design
//! `Display` is always the human-readable message, so a caller that only
//! wants to show something to the user can format the error directly.
//! Session expiry gets its own `Unauthenticated` variant; the transport tags
//! it when the server answers with the well-known expiry sentence, so nothing
//! downstream has to compare strings.

use thiserror::Error;

/// Sentence the server uses when the login session is gone.
pub const SESSION_EXPIRED_MESSAGE: &str =
    "A valid login session was not found. Please log in and try again.";

/// Errors returned by `ApiClient` operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The server returned a non-2xx status.
    #[error("{message}")]
    Http { status: u16, message: String },

    /// The server reported that the login session has expired.
    #[error("{message}")]
    Unauthenticated { status: u16, message: String },

    /// The network primitive failed before a response was received.
    #[error("{0}")]
    Network(String),

    /// A request interceptor refused to let the request through.
    #[error("request aborted: {0}")]
    Aborted(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// A successful response body could not be decoded.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// Client configuration is missing or invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ApiError {
    /// Classify a non-2xx outcome by its message.
    pub(crate) fn from_status(status: u16, message: String) -> Self {
        if message == SESSION_EXPIRED_MESSAGE {
            ApiError::Unauthenticated { status, message }
        } else {
            ApiError::Http { status, message }
        }
    }

    pub fn message(&self) -> String {
        match self {
            ApiError::Http { message, .. } | ApiError::Unauthenticated { message, .. } => {
                message.clone()
            }
            other => other.to_string(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } | ApiError::Unauthenticated { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, ApiError::Unauthenticated { .. })
    }
}
