//! Session store mutation engine
//!
//! A [`Store`] exclusively owns one session's in-memory data map for the
//! duration of a logical access. Every successful mutation re-serializes the
//! whole map, runs it through the optional encryption layer and writes it
//! back to the backend (whole-record replace). Batch operations perform a
//! single write after all in-memory changes.
//!
//! Three reserved keys live inside the map and are persisted with it but
//! hidden from enumeration: `__ttl` (key to absolute unix-epoch expiry),
//! `__flash_new` and `__flash_old` (the two flash generations). Any key
//! starting with `__` is treated as reserved.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::backend::SessionBackend;
use crate::config::{CookieConfig, StoreConfig};
use crate::crypto::{Cipher, EncryptionConfig};
use crate::error::SessionError;
use crate::scope::Scope;
use crate::{id, pattern};

pub(crate) const TTL_KEY: &str = "__ttl";
pub(crate) const FLASH_NEW: &str = "__flash_new";
pub(crate) const FLASH_OLD: &str = "__flash_old";

/// Replacement value for redacted dump entries
pub(crate) const REDACTED: &str = "***";

/// Whether a key belongs to the store's internal bookkeeping.
pub(crate) fn is_reserved(key: &str) -> bool {
    key.starts_with("__")
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn as_string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

/// One session's state, bound to a backend for persistence
pub struct Store<B> {
    backend: B,
    id: String,
    data: Map<String, Value>,
    cookie: CookieConfig,
    cipher: Option<Cipher>,
    /// Set by `destroy(clear_cookie: true)`; flips the rendered cookie to the
    /// clearing variant.
    cookie_cleared: bool,
}

impl<B> std::fmt::Debug for Store<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl<B: SessionBackend> Store<B> {
    /// Create a store with a freshly generated session id
    pub fn new(backend: B, config: StoreConfig) -> Result<Self, SessionError> {
        Self::build(backend, config, id::generate())
    }

    /// Create a store with an explicitly chosen session id.
    ///
    /// Fails with [`SessionError::InvalidId`] unless the id is exactly 32
    /// lowercase hex characters.
    pub fn with_id(
        backend: B,
        config: StoreConfig,
        id: impl Into<String>,
    ) -> Result<Self, SessionError> {
        let id = id.into();
        if !id::is_valid(&id) {
            return Err(SessionError::InvalidId(id));
        }
        Self::build(backend, config, id)
    }

    /// Create a store from an untrusted inbound id candidate (a cookie value).
    ///
    /// The candidate is used only if it validates; otherwise a fresh id is
    /// generated silently. A malformed candidate is never an error here, so an
    /// attacker-controlled cookie cannot force a failure or smuggle a path
    /// into a backend.
    pub fn from_inbound(
        backend: B,
        config: StoreConfig,
        candidate: Option<&str>,
    ) -> Result<Self, SessionError> {
        let id = match candidate {
            Some(c) if id::is_valid(c) => c.to_string(),
            _ => id::generate(),
        };
        Self::build(backend, config, id)
    }

    fn build(backend: B, config: StoreConfig, id: String) -> Result<Self, SessionError> {
        let cipher = config.encryption.as_ref().map(Cipher::new).transpose()?;
        Ok(Self {
            backend,
            id,
            data: Map::new(),
            cookie: config.cookie,
            cipher,
            cookie_cleared: false,
        })
    }

    /// The session id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The configured cookie attributes
    pub fn cookie_config(&self) -> &CookieConfig {
        &self.cookie
    }

    /// Whether payloads are persisted encrypted
    pub fn is_encrypted(&self) -> bool {
        self.cipher.is_some()
    }

    /// Render the `Set-Cookie` header value for the current session state:
    /// the issuing variant normally, the clearing variant after
    /// `destroy(clear_cookie: true)`.
    pub fn set_cookie_header(&self, https: bool) -> String {
        if self.cookie_cleared {
            self.cookie.clear_header(https)
        } else {
            self.cookie.issue_header(&self.id, https)
        }
    }

    /// Load the session from the backend and age flash data.
    ///
    /// An empty backend payload starts a fresh map. A malformed payload is a
    /// [`SessionError::Serialization`] - the store never silently falls back
    /// to empty data, since that would discard a user's session invisibly.
    /// Calling `start` again simply re-reads.
    pub fn start(&mut self) -> Result<(), SessionError> {
        let raw = self.backend.read(&self.id)?;
        if raw.is_empty() {
            self.data = Map::new();
            return Ok(());
        }

        let was_envelope = Cipher::is_envelope(&raw);
        let payload = match &self.cipher {
            Some(cipher) => cipher.decrypt(&raw)?,
            None => raw,
        };

        match serde_json::from_str(&payload)? {
            Value::Object(map) => self.data = map,
            _ => {
                return Err(SessionError::Serialization(
                    "session payload is not a JSON object".to_string(),
                ))
            }
        }

        // One-way upgrade: a plaintext payload read under an encrypted store
        // is immediately re-persisted in envelope form.
        if let Some(cipher) = &self.cipher {
            if cipher.allow_plaintext() && !was_envelope {
                tracing::debug!(id = %self.id, "migrating plaintext session payload");
                self.persist()?;
            }
        }

        self.age_flash_data()?;
        Ok(())
    }

    /// Get a value, lazily purging it first if its TTL has elapsed
    pub fn get(&mut self, key: &str) -> Result<Option<Value>, SessionError> {
        if self.purge_expired_key(key) {
            self.persist()?;
            return Ok(None);
        }
        Ok(self.data.get(key).cloned())
    }

    /// Whether a key currently exists (post TTL purge)
    pub fn has(&mut self, key: &str) -> Result<bool, SessionError> {
        if self.purge_expired_key(key) {
            self.persist()?;
            return Ok(false);
        }
        Ok(self.data.contains_key(key))
    }

    /// Set a value, clearing any TTL the key carried
    pub fn put(&mut self, key: &str, value: impl Serialize) -> Result<(), SessionError> {
        let value = serde_json::to_value(value)?;
        self.data.insert(key.to_string(), value);

        let mut ttl = self.ttl_map();
        if ttl.remove(key).is_some() {
            self.set_ttl_map(ttl);
        }

        self.persist()
    }

    /// Set a value that expires `ttl_seconds` from now.
    ///
    /// A non-positive TTL delegates to [`forget`](Self::forget).
    pub fn put_with_ttl(
        &mut self,
        key: &str,
        value: impl Serialize,
        ttl_seconds: i64,
    ) -> Result<(), SessionError> {
        if ttl_seconds <= 0 {
            return self.forget(key);
        }

        let value = serde_json::to_value(value)?;
        self.data.insert(key.to_string(), value);

        let mut ttl = self.ttl_map();
        ttl.insert(key.to_string(), (now() + ttl_seconds).into());
        self.set_ttl_map(ttl);

        self.persist()
    }

    /// Remaining seconds before the key expires; `None` when the key carries
    /// no TTL (or was just purged)
    pub fn ttl(&mut self, key: &str) -> Result<Option<i64>, SessionError> {
        if self.purge_expired_key(key) {
            self.persist()?;
            return Ok(None);
        }

        Ok(self
            .ttl_expiry(key)
            .map(|expires_at| (expires_at - now()).max(0)))
    }

    /// Absolute unix-epoch expiry of the key, `None` without a TTL
    pub fn expires_at(&mut self, key: &str) -> Result<Option<i64>, SessionError> {
        if self.purge_expired_key(key) {
            self.persist()?;
            return Ok(None);
        }

        Ok(self.ttl_expiry(key).filter(|&expires_at| expires_at > now()))
    }

    /// Refresh the TTL of an existing key. Returns false when the key does
    /// not exist (post purge) or the TTL is non-positive (the key is then
    /// forgotten).
    pub fn touch(&mut self, key: &str, ttl_seconds: i64) -> Result<bool, SessionError> {
        if !self.has(key)? {
            return Ok(false);
        }

        if ttl_seconds <= 0 {
            self.forget(key)?;
            return Ok(false);
        }

        let mut ttl = self.ttl_map();
        ttl.insert(key.to_string(), (now() + ttl_seconds).into());
        self.set_ttl_map(ttl);
        self.persist()?;

        Ok(true)
    }

    /// Refresh the TTL of every non-reserved key, optionally restricted to a
    /// prefix. Sweeps expired keys first; returns the count updated; no-op
    /// when the TTL is non-positive. Persists once.
    pub fn touch_all(
        &mut self,
        ttl_seconds: i64,
        prefix: Option<&str>,
    ) -> Result<usize, SessionError> {
        self.sweep_expired()?;

        if ttl_seconds <= 0 {
            return Ok(0);
        }

        let expires_at = now() + ttl_seconds;
        let mut ttl = self.ttl_map();
        let mut updated = 0;

        for key in self.data.keys() {
            if is_reserved(key) {
                continue;
            }
            if let Some(prefix) = prefix {
                if !key.starts_with(prefix) {
                    continue;
                }
            }
            ttl.insert(key.clone(), expires_at.into());
            updated += 1;
        }

        if updated > 0 {
            self.set_ttl_map(ttl);
            self.persist()?;
        }

        Ok(updated)
    }

    /// Remove a key and its TTL entry
    pub fn forget(&mut self, key: &str) -> Result<(), SessionError> {
        self.data.remove(key);

        let mut ttl = self.ttl_map();
        if ttl.remove(key).is_some() {
            self.set_ttl_map(ttl);
        }

        self.persist()
    }

    /// Remove several keys and their TTL entries with a single backend write
    pub fn forget_many<I, S>(&mut self, keys: I) -> Result<(), SessionError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ttl = self.ttl_map();
        let mut any = false;

        for key in keys {
            let key = key.as_ref();
            self.data.remove(key);
            ttl.remove(key);
            any = true;
        }

        if !any {
            return Ok(());
        }

        self.set_ttl_map(ttl);
        self.persist()
    }

    /// Remove every key under `namespace` followed by the default `.`
    /// delimiter. Persists once if anything was removed.
    pub fn forget_namespace(&mut self, namespace: &str) -> Result<(), SessionError> {
        let prefix = format!("{}.", namespace.trim_end_matches('.'));
        self.forget_prefixed(&prefix)
    }

    /// Remove every key carrying `prefix` exactly as a string prefix.
    pub(crate) fn forget_prefixed(&mut self, prefix: &str) -> Result<(), SessionError> {
        self.sweep_expired()?;

        let doomed: Vec<String> = self
            .data
            .keys()
            .filter(|k| !is_reserved(k) && k.starts_with(prefix))
            .cloned()
            .collect();

        if doomed.is_empty() {
            return Ok(());
        }

        let mut ttl = self.ttl_map();
        for key in &doomed {
            self.data.remove(key);
            ttl.remove(key);
        }
        self.set_ttl_map(ttl);
        self.persist()
    }

    /// Atomic get-then-forget with the same lazy purge semantics as `get`
    pub fn pull(&mut self, key: &str) -> Result<Option<Value>, SessionError> {
        if self.purge_expired_key(key) {
            self.persist()?;
            return Ok(None);
        }

        let value = self.data.get(key).cloned();
        self.forget(key)?;
        Ok(value)
    }

    /// Add `by` to an integer value, treating a missing or non-numeric
    /// current value as 0. Saturates at the i64 bounds. Returns the new value.
    pub fn increment(&mut self, key: &str, by: i64) -> Result<i64, SessionError> {
        self.purge_expired_key(key);

        let current = self
            .data
            .get(key)
            .and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)))
            .unwrap_or(0);
        let next = current.saturating_add(by);
        self.data.insert(key.to_string(), next.into());
        self.persist()?;

        Ok(next)
    }

    /// Set a value that survives exactly one more `start()` cycle
    pub fn flash(&mut self, key: &str, value: impl Serialize) -> Result<(), SessionError> {
        let value = serde_json::to_value(value)?;
        self.data.insert(key.to_string(), value);

        let mut flashed = as_string_list(self.data.get(FLASH_NEW));
        if !flashed.iter().any(|k| k == key) {
            flashed.push(key.to_string());
        }
        self.data
            .insert(FLASH_NEW.to_string(), flashed.into_iter().map(Value::from).collect());

        self.persist()
    }

    /// Non-reserved keys, optionally restricted to a prefix. Sweeps first.
    pub fn keys(&mut self, prefix: Option<&str>) -> Result<Vec<String>, SessionError> {
        self.sweep_expired()?;

        Ok(self
            .data
            .keys()
            .filter(|k| !is_reserved(k))
            .filter(|k| prefix.is_none_or(|p| k.starts_with(p)))
            .cloned()
            .collect())
    }

    /// Non-reserved keys matching a shell-glob pattern. Sweeps first.
    pub fn keys_match(&mut self, glob: &str) -> Result<Vec<String>, SessionError> {
        self.sweep_expired()?;

        Ok(self
            .data
            .keys()
            .filter(|k| !is_reserved(k) && pattern::matches(k, glob))
            .cloned()
            .collect())
    }

    /// Number of non-reserved keys. Sweeps first.
    pub fn count(&mut self) -> Result<usize, SessionError> {
        self.sweep_expired()?;
        Ok(self.data.keys().filter(|k| !is_reserved(k)).count())
    }

    /// Byte length of the payload as it would be persisted (serialized and,
    /// when enabled, encrypted). Sweeps first.
    pub fn size(&mut self) -> Result<usize, SessionError> {
        self.sweep_expired()?;
        Ok(self.encode()?.len())
    }

    /// A copy of the visible data map. Sweeps first; reserved keys excluded.
    pub fn all(&mut self) -> Result<Map<String, Value>, SessionError> {
        self.sweep_expired()?;

        Ok(self
            .data
            .iter()
            .filter(|(k, _)| !is_reserved(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    /// Like [`all`](Self::all), with values replaced by `"***"` for keys in
    /// `redact_keys` or matching any glob in `redact_patterns`
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

    /// Remove every key whose TTL has elapsed. A single backend write covers
    /// the whole sweep; nothing is written when nothing expired.
    pub fn sweep_expired(&mut self) -> Result<(), SessionError> {
        let mut ttl = self.ttl_map();
        if ttl.is_empty() {
            return Ok(());
        }

        let now = now();
        let expired: Vec<String> = ttl
            .iter()
            .filter(|(_, v)| v.as_i64().is_none_or(|expires_at| expires_at <= now))
            .map(|(k, _)| k.clone())
            .collect();

        if expired.is_empty() {
            return Ok(());
        }

        for key in &expired {
            ttl.remove(key);
            self.data.remove(key);
        }
        self.set_ttl_map(ttl);
        self.persist()
    }

    /// Move the session to a fresh id, persisting the current data under it.
    /// With `destroy_old` the old record is deleted from the backend. Defends
    /// against session fixation; the caller should re-send the cookie.
    pub fn regenerate_id(&mut self, destroy_old: bool) -> Result<(), SessionError> {
        let old_id = std::mem::replace(&mut self.id, id::generate());
        self.cookie_cleared = false;

        tracing::debug!(old = %old_id, new = %self.id, "session id regenerated");
        self.persist()?;

        if destroy_old {
            self.backend.destroy(&old_id)?;
        }
        Ok(())
    }

    /// Reconfigure the encryption layer and immediately re-persist, so the
    /// stored payload is sealed under the new primary key.
    pub fn rotate_encryption_key(&mut self, config: EncryptionConfig) -> Result<(), SessionError> {
        self.cipher = Some(Cipher::new(&config)?);
        self.persist()
    }

    /// Clear the in-memory data and delete the persisted record. With
    /// `clear_cookie`, [`set_cookie_header`](Self::set_cookie_header) renders
    /// the clearing variant from here on.
    pub fn destroy(&mut self, clear_cookie: bool) -> Result<(), SessionError> {
        self.data = Map::new();
        self.backend.destroy(&self.id)?;

        if clear_cookie {
            self.cookie_cleared = true;
        }

        tracing::debug!(id = %self.id, "session destroyed");
        Ok(())
    }

    /// A namespaced view over this store with the default `.` delimiter
    pub fn scope<'a>(&'a mut self, namespace: &str) -> Scope<'a, B> {
        Scope::new(self, namespace, ".")
    }

    /// A namespaced view with a custom delimiter
    pub fn scope_with_delimiter<'a>(&'a mut self, namespace: &str, delimiter: &str) -> Scope<'a, B> {
        Scope::new(self, namespace, delimiter)
    }

    // Flash aging: keys flashed two cycles ago are dropped, last cycle's keys
    // are promoted into `__flash_old`, and the new-generation list starts
    // empty. Runs once per `start()`; persists at most once.
    fn age_flash_data(&mut self) -> Result<(), SessionError> {
        let old_entry = self.data.remove(FLASH_OLD);
        let new_entry = self.data.remove(FLASH_NEW);
        let mut changed = old_entry.is_some() || new_entry.is_some();

        for key in as_string_list(old_entry.as_ref()) {
            if self.data.remove(&key).is_some() {
                changed = true;
            }
        }

        let promoted = as_string_list(new_entry.as_ref());
        if !promoted.is_empty() {
            self.data.insert(
                FLASH_OLD.to_string(),
                promoted.into_iter().map(Value::from).collect(),
            );
        }

        if changed {
            self.persist()?;
        }
        Ok(())
    }

    fn persist(&mut self) -> Result<(), SessionError> {
        let payload = self.encode()?;
        self.backend.write(&self.id, &payload)?;
        tracing::debug!(id = %self.id, bytes = payload.len(), "session persisted");
        Ok(())
    }

    fn encode(&self) -> Result<String, SessionError> {
        let json = serde_json::to_string(&self.data)?;
        match &self.cipher {
            Some(cipher) => cipher.encrypt(&json),
            None => Ok(json),
        }
    }

    fn ttl_map(&self) -> Map<String, Value> {
        match self.data.get(TTL_KEY) {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        }
    }

    /// Empty TTL maps drop the `__ttl` entry entirely, so a session without
    /// TTLs carries no bookkeeping noise.
    fn set_ttl_map(&mut self, ttl: Map<String, Value>) {
        if ttl.is_empty() {
            self.data.remove(TTL_KEY);
        } else {
            self.data.insert(TTL_KEY.to_string(), Value::Object(ttl));
        }
    }

    fn ttl_expiry(&self, key: &str) -> Option<i64> {
        match self.data.get(TTL_KEY) {
            Some(Value::Object(map)) => map.get(key).and_then(Value::as_i64),
            _ => None,
        }
    }

    /// Remove the key and its TTL entry if the TTL has elapsed. Mutates only;
    /// the caller decides when to persist.
    fn purge_expired_key(&mut self, key: &str) -> bool {
        let Some(expires_at) = self.ttl_expiry(key) else {
            return false;
        };
        if expires_at > now() {
            return false;
        }

        let mut ttl = self.ttl_map();
        ttl.remove(key);
        self.set_ttl_map(ttl);
        self.data.remove(key);
        true
    }
}
