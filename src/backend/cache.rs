//! Generic cache-backed session backend
//!
//! Adapts any key/value cache (memcached client, application cache layer,
//! etc.) to the session backend contract. Cache operations are wrapped in the
//! bounded retry policy since the cache is usually on the other side of a
//! socket.

use std::time::Duration;

use super::retry::with_retry;
use super::{BackendError, RetryPolicy, SessionBackend};

/// Minimal contract a cache must satisfy to hold session payloads
pub trait KeyValueCache {
    /// Fetch a value; `None` when the key is absent or evicted
    fn get(&mut self, key: &str) -> Result<Option<String>, BackendError>;

    /// Store a value, optionally with a cache-native TTL
    fn set(&mut self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), BackendError>;

    /// Delete a value; deleting an absent key succeeds
    fn delete(&mut self, key: &str) -> Result<(), BackendError>;
}

/// Session backend over any [`KeyValueCache`]
pub struct CacheBackend<C> {
    cache: C,
    prefix: String,
    ttl: Option<Duration>,
    retry: RetryPolicy,
}

impl<C: KeyValueCache> CacheBackend<C> {
    /// Create a backend with the default prefix (`sess_`), no cache-native TTL
    /// and the default retry policy
    pub fn new(cache: C) -> Self {
        Self {
            cache,
            prefix: "sess_".to_string(),
            ttl: None,
            retry: RetryPolicy::default(),
        }
    }

    /// Set the cache key prefix (default: "sess_")
    pub fn with_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Set a cache-native TTL applied to every write
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Set the retry policy (default: 1 retry, 50ms delay)
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn cache_key(&self, id: &str) -> String {
        format!("{}{}", self.prefix, id)
    }
}

impl<C: KeyValueCache> SessionBackend for CacheBackend<C> {
    fn read(&mut self, id: &str) -> Result<String, BackendError> {
        let key = self.cache_key(id);
        let cache = &mut self.cache;
        let value = with_retry(&self.retry, "cache read", || cache.get(&key))?;
        Ok(value.unwrap_or_default())
    }

    fn write(&mut self, id: &str, payload: &str) -> Result<(), BackendError> {
        let key = self.cache_key(id);
        let ttl = self.ttl;
        let cache = &mut self.cache;
        with_retry(&self.retry, "cache write", || cache.set(&key, payload, ttl))
    }

    fn destroy(&mut self, id: &str) -> Result<(), BackendError> {
        let key = self.cache_key(id);
        let cache = &mut self.cache;
        with_retry(&self.retry, "cache destroy", || cache.delete(&key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Cache that fails a configurable number of times before working
    #[derive(Default)]
    struct FlakyCache {
        map: HashMap<String, String>,
        failures_left: u32,
        calls: u32,
    }

    impl FlakyCache {
        fn failing(times: u32) -> Self {
            Self {
                failures_left: times,
                ..Default::default()
            }
        }

        fn trip(&mut self) -> Result<(), BackendError> {
            self.calls += 1;
            if self.failures_left > 0 {
                self.failures_left -= 1;
                return Err(BackendError::new("cache unreachable"));
            }
            Ok(())
        }
    }

    impl KeyValueCache for FlakyCache {
        fn get(&mut self, key: &str) -> Result<Option<String>, BackendError> {
            self.trip()?;
            Ok(self.map.get(key).cloned())
        }

        fn set(&mut self, key: &str, value: &str, _ttl: Option<Duration>) -> Result<(), BackendError> {
            self.trip()?;
            self.map.insert(key.to_string(), value.to_string());
            Ok(())
        }

        fn delete(&mut self, key: &str) -> Result<(), BackendError> {
            self.trip()?;
            self.map.remove(key);
            Ok(())
        }
    }

    fn no_delay(retries: u32) -> RetryPolicy {
        RetryPolicy::new(retries, Duration::ZERO)
    }

    #[test]
    fn test_round_trip_with_prefix() {
        let mut backend = CacheBackend::new(FlakyCache::default()).with_prefix("app:sess:");

        backend.write("abc", "payload").unwrap();
        assert_eq!(backend.cache.map.get("app:sess:abc").unwrap(), "payload");
        assert_eq!(backend.read("abc").unwrap(), "payload");

        backend.destroy("abc").unwrap();
        assert_eq!(backend.read("abc").unwrap(), "");
    }

    #[test]
    fn test_single_failure_is_retried() {
        let mut backend =
            CacheBackend::new(FlakyCache::failing(1)).with_retry_policy(no_delay(1));

        backend.write("abc", "payload").unwrap();
        assert_eq!(backend.cache.calls, 2);
        assert_eq!(backend.read("abc").unwrap(), "payload");
    }

    #[test]
    fn test_persistent_failure_exhausts_retries() {
        let mut backend =
            CacheBackend::new(FlakyCache::failing(u32::MAX)).with_retry_policy(no_delay(2));

        assert!(backend.write("abc", "payload").is_err());
        assert_eq!(backend.cache.calls, 3); // initial + 2 retries
    }
}
