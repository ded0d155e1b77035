//! # sessionkit
//!
//! Cookie-keyed session store with per-key TTL expiry, two-generation flash
//! data, namespaced views and an optional transparent encryption layer with
//! key rotation.
//!
//! A [`Store`] owns one session's key/value data for the duration of a
//! logical access. It reads the whole record from a pluggable backend on
//! [`start`](Store::start), mutates a private in-memory copy, and writes the
//! whole record back on every successful mutation (last write wins across
//! concurrent accesses). The session id travels in a cookie whose attributes
//! the store renders as a `Set-Cookie` header value; sending it is the HTTP
//! layer's job.
//!
//! ## Features
//!
//! - **Per-key TTL**: values expire individually, enforced lazily on access
//!   and eagerly on enumeration sweeps
//! - **Flash data**: a value set during one request survives exactly one
//!   more request cycle
//! - **Namespacing**: [`Scope`] views partition one session's key space by
//!   prefix with no data duplication
//! - **Transparent encryption**: AES-256-GCM payload envelopes with
//!   multi-key rotation and a one-way plaintext migration path
//! - **Pluggable backends**: in-memory, filesystem, generic cache adapter,
//!   Redis (plain, Sentinel, Cluster)
//!
//! ## Quick start
//!
//! ```rust
//! use sessionkit::{MemoryBackend, Store, StoreConfig};
//!
//! let inbound_cookie = None; // value of the SESSION_ID cookie, if any
//! let mut store = Store::from_inbound(MemoryBackend::new(), StoreConfig::new(), inbound_cookie)
//!     .expect("config is valid");
//! store.start().unwrap();
//!
//! store.put("user", "alice").unwrap();
//! store.flash("notice", "saved").unwrap();
//! store.scope("cart").put("items", vec![1, 2, 3]).unwrap();
//!
//! // Attach this to the HTTP response.
//! let set_cookie = store.set_cookie_header(false);
//! assert!(set_cookie.starts_with("SESSION_ID="));
//! ```

pub mod backend;
pub mod config;
pub mod crypto;
pub mod error;
pub mod id;
pub mod scope;
pub mod store;

mod pattern;

pub use backend::{
    BackendError, CacheBackend, FileBackend, KeyValueCache, MemoryBackend, RetryPolicy,
    SessionBackend,
};
pub use config::{CookieConfig, SameSite, StoreConfig};
pub use crypto::EncryptionConfig;
pub use error::SessionError;
pub use scope::Scope;
pub use store::Store;

#[cfg(feature = "redis-backend")]
pub use backend::{ClusterBackend, RedisBackend};
