//! In-memory session backend
//!
//! This is primarily for development and testing. Sessions are lost on
//! process exit and never shared across processes.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use super::{BackendError, SessionBackend};

/// In-memory session backend
///
/// Clones share the same underlying map, so two stores constructed from
/// clones of one `MemoryBackend` see each other's writes.
#[derive(Default)]
pub struct MemoryBackend {
    records: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryBackend {
    /// Create a new empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether the backend holds no records
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl Clone for MemoryBackend {
    fn clone(&self) -> Self {
        Self {
            records: Arc::clone(&self.records),
        }
    }
}

impl SessionBackend for MemoryBackend {
    fn read(&mut self, id: &str) -> Result<String, BackendError> {
        Ok(self.records.read().get(id).cloned().unwrap_or_default())
    }

    fn write(&mut self, id: &str, payload: &str) -> Result<(), BackendError> {
        self.records.write().insert(id.to_string(), payload.to_string());
        Ok(())
    }

    fn destroy(&mut self, id: &str) -> Result<(), BackendError> {
        self.records.write().remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_write_destroy() {
        let mut backend = MemoryBackend::new();

        assert_eq!(backend.read("abc").unwrap(), "");

        backend.write("abc", r#"{"user":"alice"}"#).unwrap();
        assert_eq!(backend.read("abc").unwrap(), r#"{"user":"alice"}"#);

        backend.write("abc", "{}").unwrap();
        assert_eq!(backend.read("abc").unwrap(), "{}");

        backend.destroy("abc").unwrap();
        assert_eq!(backend.read("abc").unwrap(), "");
    }

    #[test]
    fn test_destroy_missing_id_succeeds() {
        let mut backend = MemoryBackend::new();
        assert!(backend.destroy("nope").is_ok());
    }

    #[test]
    fn test_clones_share_records() {
        let mut a = MemoryBackend::new();
        let mut b = a.clone();

        a.write("abc", "payload").unwrap();
        assert_eq!(b.read("abc").unwrap(), "payload");
        assert_eq!(b.len(), 1);
    }

    #[test]
    fn test_gc_is_a_noop() {
        let mut backend = MemoryBackend::new();
        backend.write("abc", "payload").unwrap();
        assert_eq!(backend.gc(std::time::Duration::ZERO).unwrap(), 0);
        assert_eq!(backend.read("abc").unwrap(), "payload");
    }
}
