//! Session error types

use std::fmt;

use crate::backend::BackendError;

/// Errors that can occur during session operations
#[derive(Debug)]
pub enum SessionError {
    /// Explicitly supplied session ID fails the format check
    InvalidId(String),
    /// Session data could not be encoded to / decoded from JSON
    Serialization(String),
    /// Encryption key material could not be resolved to 32 raw bytes
    EncryptionConfig(String),
    /// The AEAD seal operation itself failed while persisting a payload
    Encryption,
    /// Stored payload is not a valid envelope, or no configured key opens it
    Decryption,
    /// A backend operation failed and stayed failed through every retry attempt
    Backend(BackendError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::InvalidId(id) => write!(f, "invalid session id: {:?}", id),
            SessionError::Serialization(msg) => write!(f, "serialization error: {}", msg),
            SessionError::EncryptionConfig(msg) => {
                write!(f, "encryption configuration error: {}", msg)
            }
            SessionError::Encryption => write!(f, "failed to encrypt session payload"),
            SessionError::Decryption => write!(f, "failed to decrypt session payload"),
            SessionError::Backend(e) => write!(f, "session backend error: {}", e),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Backend(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        SessionError::Serialization(err.to_string())
    }
}

impl From<BackendError> for SessionError {
    fn from(err: BackendError) -> Self {
        SessionError::Backend(err)
    }
}
