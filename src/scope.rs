//! Namespaced views over a store
//!
//! A [`Scope`] prefixes every key with `namespace + delimiter` before
//! delegating to the underlying [`Store`], and strips the prefix from
//! everything it enumerates. Two scopes with different namespaces are fully
//! isolated from each other's `all()`/`keys()` views while sharing the same
//! persisted record - there is no data duplication.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::backend::SessionBackend;
use crate::error::SessionError;
use crate::pattern;
use crate::store::{Store, REDACTED};

/// A prefix-delimited view over one [`Store`]
pub struct Scope<'a, B> {
    store: &'a mut Store<B>,
    prefix: String,
}

impl<'a, B: SessionBackend> Scope<'a, B> {
    pub(crate) fn new(store: &'a mut Store<B>, namespace: &str, delimiter: &str) -> Self {
        let prefix = format!("{}{}", namespace.trim_end_matches(delimiter), delimiter);
        Self { store, prefix }
    }

    /// The full prefix this scope applies, delimiter included
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn scoped(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Get a value from this namespace
    pub fn get(&mut self, key: &str) -> Result<Option<Value>, SessionError> {
        self.store.get(&self.scoped(key))
    }

    /// Whether the namespaced key exists
    pub fn has(&mut self, key: &str) -> Result<bool, SessionError> {
        self.store.has(&self.scoped(key))
    }

    /// Set a value in this namespace
    pub fn put(&mut self, key: &str, value: impl Serialize) -> Result<(), SessionError> {
        self.store.put(&self.scoped(key), value)
    }

    /// Set a value in this namespace with a TTL
    pub fn put_with_ttl(
        &mut self,
        key: &str,
        value: impl Serialize,
        ttl_seconds: i64,
    ) -> Result<(), SessionError> {
        self.store.put_with_ttl(&self.scoped(key), value, ttl_seconds)
    }

    /// Remaining TTL of the namespaced key
    pub fn ttl(&mut self, key: &str) -> Result<Option<i64>, SessionError> {
        self.store.ttl(&self.scoped(key))
    }

    /// Absolute expiry of the namespaced key
    pub fn expires_at(&mut self, key: &str) -> Result<Option<i64>, SessionError> {
        self.store.expires_at(&self.scoped(key))
    }

    /// Refresh the TTL of the namespaced key
    pub fn touch(&mut self, key: &str, ttl_seconds: i64) -> Result<bool, SessionError> {
        self.store.touch(&self.scoped(key), ttl_seconds)
    }

    /// Refresh the TTL of every key in this namespace
    pub fn touch_all(&mut self, ttl_seconds: i64) -> Result<usize, SessionError> {
        let prefix = self.prefix.clone();
        self.store.touch_all(ttl_seconds, Some(&prefix))
    }

    /// Remove the namespaced key
    pub fn forget(&mut self, key: &str) -> Result<(), SessionError> {
        self.store.forget(&self.scoped(key))
    }

    /// Remove several namespaced keys with a single backend write
    pub fn forget_many<I, S>(&mut self, keys: I) -> Result<(), SessionError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let scoped: Vec<String> = keys.into_iter().map(|k| self.scoped(k.as_ref())).collect();
        self.store.forget_many(scoped)
    }

    /// Remove every key under this scope's prefix
    pub fn forget_namespace(&mut self) -> Result<(), SessionError> {
        let prefix = self.prefix.clone();
        self.store.forget_prefixed(&prefix)
    }

    /// Get-then-forget on the namespaced key
    pub fn pull(&mut self, key: &str) -> Result<Option<Value>, SessionError> {
        self.store.pull(&self.scoped(key))
    }

    /// Increment the namespaced key
    pub fn increment(&mut self, key: &str, by: i64) -> Result<i64, SessionError> {
        self.store.increment(&self.scoped(key), by)
    }

    /// Flash a value in this namespace
    pub fn flash(&mut self, key: &str, value: impl Serialize) -> Result<(), SessionError> {
        self.store.flash(&self.scoped(key), value)
    }

    /// This namespace's data, keys stripped of the prefix
    pub fn all(&mut self) -> Result<Map<String, Value>, SessionError> {
        let prefix = self.prefix.clone();
        let mut scoped = Map::new();
        for (key, value) in self.store.all()? {
            if let Some(stripped) = key.strip_prefix(&prefix) {
                scoped.insert(stripped.to_string(), value);
            }
        }
        Ok(scoped)
    }

    /// This namespace's keys, prefix stripped
    pub fn keys(&mut self) -> Result<Vec<String>, SessionError> {
        let prefix = self.prefix.clone();
        Ok(self
            .store
            .keys(Some(&prefix))?
            .into_iter()
            .filter_map(|k| k.strip_prefix(&prefix).map(String::from))
            .collect())
    }

    /// This namespace's keys matching a glob applied to the stripped name
    pub fn keys_match(&mut self, glob: &str) -> Result<Vec<String>, SessionError> {
        let prefix = self.prefix.clone();
        let scoped_glob = format!("{}{}", prefix, glob);
        Ok(self
            .store
            .keys_match(&scoped_glob)?
            .into_iter()
            .filter_map(|k| k.strip_prefix(&prefix).map(String::from))
            .collect())
    }

    /// Number of keys in this namespace
    pub fn count(&mut self) -> Result<usize, SessionError> {
        Ok(self.keys()?.len())
    }

    /// Byte length of this namespace's data serialized as JSON.
    ///
    /// Unlike [`Store::size`] this never includes the encryption envelope:
    /// the scope is a logical partition, not a persisted unit.
    pub fn size(&mut self) -> Result<usize, SessionError> {
        let data = self.all()?;
        Ok(serde_json::to_string(&data)?.len())
    }

    /// Like [`all`](Self::all) with redaction applied to the stripped names
    pub fn dump(
        &mut self,
        redact_keys: &[&str],
        redact_patterns: &[&str],
    ) -> Result<Map<String, Value>, SessionError> {
        let mut data = self.all()?;

        for (key, value) in data.iter_mut() {
            if redact_keys.contains(&key.as_str())
                || redact_patterns.iter().any(|p| pattern::matches(key, p))
            {
                *value = Value::from(REDACTED);
            }
        }

        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::config::StoreConfig;
    use serde_json::json;

    fn store() -> Store<MemoryBackend> {
        let mut store = Store::new(MemoryBackend::new(), StoreConfig::new()).unwrap();
        store.start().unwrap();
        store
    }

    #[test]
    fn test_namespace_isolation() {
        let mut store = store();

        store.scope("admin").put("token", "a").unwrap();
        store.scope("user").put("token", "b").unwrap();

        let admin = store.scope("admin").all().unwrap();
        assert_eq!(admin, json!({"token": "a"}).as_object().unwrap().clone());

        let user = store.scope("user").all().unwrap();
        assert_eq!(user, json!({"token": "b"}).as_object().unwrap().clone());

        let mut keys = store.keys(None).unwrap();
        keys.sort();
        assert_eq!(keys, vec!["admin.token", "user.token"]);
    }

    #[test]
    fn test_scoped_reads_see_scoped_writes() {
        let mut store = store();

        store.scope("cart").put("total", 42).unwrap();
        assert_eq!(store.scope("cart").get("total").unwrap(), Some(json!(42)));
        assert!(store.scope("cart").has("total").unwrap());
        assert_eq!(store.get("cart.total").unwrap(), Some(json!(42)));
        assert_eq!(store.scope("other").get("total").unwrap(), None);
    }

    #[test]
    fn test_trailing_delimiter_is_normalized() {
        let mut store = store();
        store.scope("cart.").put("x", 1).unwrap();
        assert_eq!(store.scope("cart").get("x").unwrap(), Some(json!(1)));
        assert_eq!(store.scope("cart").prefix(), "cart.");
    }

    #[test]
    fn test_custom_delimiter() {
        let mut store = store();

        store.scope_with_delimiter("admin", ":").put("token", "a").unwrap();
        assert_eq!(store.get("admin:token").unwrap(), Some(json!("a")));

        let mut scope = store.scope_with_delimiter("admin", ":");
        assert_eq!(scope.keys().unwrap(), vec!["token"]);
        scope.forget_namespace().unwrap();
        assert_eq!(store.get("admin:token").unwrap(), None);
    }

    #[test]
    fn test_keys_and_keys_match_strip_prefix() {
        let mut store = store();

        store.scope("user").put("name", "alice").unwrap();
        store.scope("user").put("email", "a@example.com").unwrap();
        store.scope("admin").put("name", "root").unwrap();

        let mut keys = store.scope("user").keys().unwrap();
        keys.sort();
        assert_eq!(keys, vec!["email", "name"]);

        assert_eq!(store.scope("user").keys_match("na*").unwrap(), vec!["name"]);
        assert_eq!(store.scope("user").count().unwrap(), 2);
    }

    #[test]
    fn test_forget_namespace_only_clears_own_prefix() {
        let mut store = store();

        store.scope("admin").put("token", "a").unwrap();
        store.scope("user").put("token", "b").unwrap();

        store.scope("admin").forget_namespace().unwrap();

        assert_eq!(store.scope("admin").count().unwrap(), 0);
        assert_eq!(store.scope("user").get("token").unwrap(), Some(json!("b")));
    }

    #[test]
    fn test_scope_ttl_and_flash_share_store_bookkeeping() {
        let mut store = store();

        store.scope("cart").put_with_ttl("items", json!([1]), 60).unwrap();
        assert!(store.scope("cart").ttl("items").unwrap().unwrap() > 0);
        assert!(store.ttl("cart.items").unwrap().is_some());

        store.scope("ui").flash("notice", "saved").unwrap();
        assert_eq!(store.get("ui.notice").unwrap(), Some(json!("saved")));
    }

    #[test]
    fn test_scope_touch_all_is_limited_to_namespace() {
        let mut store = store();

        store.scope("cart").put("a", 1).unwrap();
        store.scope("cart").put("b", 2).unwrap();
        store.put("outside", 3).unwrap();

        assert_eq!(store.scope("cart").touch_all(60).unwrap(), 2);
        assert_eq!(store.ttl("outside").unwrap(), None);
    }

    #[test]
    fn test_scope_dump_redacts_stripped_names() {
        let mut store = store();

        store.scope("auth").put("password", "hunter2").unwrap();
        store.scope("auth").put("user", "alice").unwrap();

        let dump = store.scope("auth").dump(&["password"], &[]).unwrap();
        assert_eq!(dump["password"], json!("***"));
        assert_eq!(dump["user"], json!("alice"));
    }

    #[test]
    fn test_scope_size_counts_scoped_json() {
        let mut store = store();
        assert_eq!(store.scope("empty").size().unwrap(), "{}".len());

        store.scope("cart").put("a", 1).unwrap();
        assert_eq!(store.scope("cart").size().unwrap(), r#"{"a":1}"#.len());
    }

    #[test]
    fn test_scope_forget_many_and_pull() {
        let mut store = store();

        store.scope("cart").put("a", 1).unwrap();
        store.scope("cart").put("b", 2).unwrap();
        store.scope("cart").forget_many(["a", "b"]).unwrap();
        assert_eq!(store.scope("cart").count().unwrap(), 0);

        store.scope("cart").put("c", 3).unwrap();
        assert_eq!(store.scope("cart").pull("c").unwrap(), Some(json!(3)));
        assert_eq!(store.scope("cart").get("c").unwrap(), None);

        assert_eq!(store.scope("cart").increment("visits", 2).unwrap(), 2);
    }
}
