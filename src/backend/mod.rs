//! Session storage backends

mod cache;
mod file;
mod memory;
mod retry;
mod traits;

pub use cache::{CacheBackend, KeyValueCache};
pub use file::FileBackend;
pub use memory::MemoryBackend;
pub use retry::RetryPolicy;
pub use traits::{BackendError, SessionBackend};

#[cfg(feature = "redis-backend")]
mod redis_backend;

#[cfg(feature = "redis-backend")]
pub use redis_backend::{ClusterBackend, RedisBackend};
