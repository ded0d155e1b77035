//! Session backend trait

use std::fmt;
use std::time::Duration;

/// Error raised by a backend operation.
///
/// Backend errors are transient from the caller's point of view: network
/// backends retry them per their [`RetryPolicy`](super::RetryPolicy) before
/// giving up. A failure that survives every attempt reaches the store as
/// [`SessionError::Backend`](crate::SessionError::Backend).
#[derive(Debug)]
pub struct BackendError(String);

impl BackendError {
    /// Create a backend error from a message
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for BackendError {}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        Self(err.to_string())
    }
}

#[cfg(feature = "redis-backend")]
impl From<redis::RedisError> for BackendError {
    fn from(err: redis::RedisError) -> Self {
        Self(err.to_string())
    }
}

/// Trait for session storage backends
///
/// Payloads are opaque strings keyed by session id; the store owns their
/// format. Implementations must treat `write` as a full-record replace and
/// `destroy` as idempotent.
pub trait SessionBackend {
    /// Read the payload stored for `id`.
    ///
    /// An empty string means "no data for this id", not an error.
    fn read(&mut self, id: &str) -> Result<String, BackendError>;

    /// Replace the payload stored for `id`.
    fn write(&mut self, id: &str, payload: &str) -> Result<(), BackendError>;

    /// Delete the payload stored for `id`. Destroying a nonexistent id succeeds.
    fn destroy(&mut self, id: &str) -> Result<(), BackendError>;

    /// Remove backend-native records older than `max_lifetime`, returning the
    /// count removed.
    ///
    /// Only meaningful for backends with their own implicit expiry (e.g.
    /// file-based); orthogonal to the store's per-key TTL map.
    fn gc(&mut self, max_lifetime: Duration) -> Result<u64, BackendError> {
        let _ = max_lifetime;
        Ok(0)
    }
}
