//! Session error types

use std::fmt;

/// Errors that can occur during session operations
#[derive(Debug)]
pub enum SessionError {
    /// Error during serialization/deserialization
    SerializationError(String),
    /// The signing secret cannot be used (currently: it is empty)
    InvalidSecret,
    /// Token does not have the `header.payload.signature` shape or an unsupported header
    MalformedToken(String),
    /// Invalid token signature
    InvalidSignature,
    /// Token carries an `exp` claim in the past
    Expired,
    /// Token lifetime in seconds does not fit a timestamp
    InvalidTtl(u64),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            SessionError::InvalidSecret => write!(f, "Signing secret must not be empty"),
            SessionError::MalformedToken(msg) => write!(f, "Malformed session token: {}", msg),
            SessionError::InvalidSignature => write!(f, "Invalid token signature"),
            SessionError::Expired => write!(f, "Session token expired"),
            SessionError::InvalidTtl(ttl) => write!(f, "Session lifetime of {} seconds is too large", ttl),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        SessionError::SerializationError(err.to_string())
    }
}

impl From<base64::DecodeError> for SessionError {
    fn from(err: base64::DecodeError) -> Self {
        SessionError::MalformedToken(err.to_string())
    }
}
