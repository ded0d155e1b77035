//! Redis session backends
//!
//! Payloads are stored under `prefix + id`. When a backend TTL is configured,
//! writes use `SETEX` so Redis expires records natively; the store's per-key
//! TTL map is independent of this.

use std::time::Duration;

use redis::cluster::{ClusterClient, ClusterConnection};
use redis::{Commands, Connection, ConnectionLike};

use super::retry::with_retry;
use super::{BackendError, RetryPolicy, SessionBackend};

/// Redis session backend over any Redis connection flavor
pub struct RedisBackend<C = Connection> {
    conn: C,
    prefix: String,
    ttl: Option<Duration>,
    retry: RetryPolicy,
}

/// Redis Cluster session backend
pub type ClusterBackend = RedisBackend<ClusterConnection>;

impl RedisBackend<Connection> {
    /// Create a backend from a Redis client
    pub fn new(client: redis::Client) -> Result<Self, BackendError> {
        Ok(Self::from_connection(client.get_connection()?))
    }

    /// Create a backend from a connection URL
    pub fn from_url(url: &str) -> Result<Self, BackendError> {
        Self::new(redis::Client::open(url)?)
    }

    /// Create a backend by resolving the current master through a Sentinel.
    ///
    /// Asks the Sentinel at `sentinel_url` for the master address of
    /// `service` and connects to it.
    pub fn via_sentinel(sentinel_url: &str, service: &str) -> Result<Self, BackendError> {
        let sentinel = redis::Client::open(sentinel_url)?;
        let mut conn = sentinel.get_connection()?;

        let addr: Vec<String> = redis::cmd("SENTINEL")
            .arg("get-master-addr-by-name")
            .arg(service)
            .query(&mut conn)?;

        let [host, port] = addr.as_slice() else {
            return Err(BackendError::new(format!(
                "unable to resolve redis master for service {}",
                service
            )));
        };

        tracing::debug!(%host, %port, service, "resolved redis master via sentinel");
        Self::from_url(&format!("redis://{}:{}", host, port))
    }
}

impl ClusterBackend {
    /// Create a backend connected to a Redis Cluster
    pub fn cluster<T: redis::IntoConnectionInfo>(nodes: Vec<T>) -> Result<Self, BackendError> {
        let client = ClusterClient::new(nodes)?;
        Ok(Self::from_connection(client.get_connection()?))
    }
}

impl<C: ConnectionLike> RedisBackend<C> {
    /// Wrap an existing connection
    pub fn from_connection(conn: C) -> Self {
        Self {
            conn,
            prefix: "sess_".to_string(),
            ttl: None,
            retry: RetryPolicy::default(),
        }
    }

    /// Set the key prefix (default: "sess_")
    pub fn with_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Expire records natively in Redis after `ttl`
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Set the retry policy (default: 1 retry, 50ms delay)
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn redis_key(&self, id: &str) -> String {
        format!("{}{}", self.prefix, id)
    }
}

impl<C: ConnectionLike> SessionBackend for RedisBackend<C> {
    fn read(&mut self, id: &str) -> Result<String, BackendError> {
        let key = self.redis_key(id);
        let conn = &mut self.conn;
        let value: Option<String> = with_retry(&self.retry, "redis read", || {
            Ok(conn.get(&key)?)
        })?;
        Ok(value.unwrap_or_default())
    }

    fn write(&mut self, id: &str, payload: &str) -> Result<(), BackendError> {
        let key = self.redis_key(id);
        let ttl_secs = self.ttl.map(|t| t.as_secs().max(1));
        let conn = &mut self.conn;

        with_retry(&self.retry, "redis write", || {
            match ttl_secs {
                Some(secs) => conn.set_ex::<_, _, ()>(&key, payload, secs)?,
                None => conn.set::<_, _, ()>(&key, payload)?,
            }
            Ok(())
        })
    }

    fn destroy(&mut self, id: &str) -> Result<(), BackendError> {
        let key = self.redis_key(id);
        let conn = &mut self.conn;
        with_retry(&self.retry, "redis destroy", || {
            conn.del::<_, ()>(&key)?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Integration tests need a local Redis; run with
    // `cargo test --features redis-backend -- --ignored`.

    fn connect() -> RedisBackend {
        RedisBackend::from_url("redis://127.0.0.1/").expect("redis not reachable")
    }

    #[test]
    #[ignore]
    fn test_redis_round_trip() {
        let mut backend = connect().with_prefix("sessionkit_test:");

        backend.write("abc", r#"{"user":"alice"}"#).unwrap();
        assert_eq!(backend.read("abc").unwrap(), r#"{"user":"alice"}"#);

        backend.destroy("abc").unwrap();
        assert_eq!(backend.read("abc").unwrap(), "");
        backend.destroy("abc").unwrap();
    }

    #[test]
    #[ignore]
    fn test_redis_native_ttl() {
        let mut backend = connect()
            .with_prefix("sessionkit_test_ttl:")
            .with_ttl(Duration::from_secs(1));

        backend.write("abc", "payload").unwrap();
        assert_eq!(backend.read("abc").unwrap(), "payload");

        std::thread::sleep(Duration::from_millis(1100));
        assert_eq!(backend.read("abc").unwrap(), "");
    }
}
