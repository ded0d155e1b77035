//! Bounded retry for network-backed stores
//!
//! Retries are indiscriminate: every backend error is treated as transient
//! until the attempt budget runs out. The delay is a blocking sleep.

use std::thread;
use std::time::Duration;

use super::BackendError;

/// Retry policy applied by network-backed session backends
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    /// Additional attempts after the first failure (default: 1)
    pub retries: u32,

    /// Fixed pause between attempts (default: 50ms)
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 1,
            delay: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the given attempt budget and delay
    pub fn new(retries: u32, delay: Duration) -> Self {
        Self { retries, delay }
    }

    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            retries: 0,
            delay: Duration::ZERO,
        }
    }
}

/// Run `op`, retrying per `policy`. The error from the final attempt
/// propagates unchanged.
pub(crate) fn with_retry<T>(
    policy: &RetryPolicy,
    what: &str,
    mut op: impl FnMut() -> Result<T, BackendError>,
) -> Result<T, BackendError> {
    let mut attempt = 0;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.retries => {
                tracing::warn!(
                    operation = what,
                    attempt = attempt + 1,
                    error = %err,
                    "backend operation failed, retrying"
                );
                if !policy.delay.is_zero() {
                    thread::sleep(policy.delay);
                }
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
