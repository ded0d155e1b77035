//! Versioned authenticated encryption for persisted payloads
//!
//! Payloads are sealed with AES-256-GCM and wrapped in a self-describing
//! envelope: `"v1:" + base64(nonce || ciphertext + tag)`. Decryption tries the
//! primary key first and then each previous key in order, so keys can be
//! rotated without invalidating sessions that are already out there.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::RngCore;

use crate::error::SessionError;

/// Envelope version tag
const ENVELOPE_PREFIX: &str = "v1:";

/// AES-GCM nonce size in bytes
const NONCE_LEN: usize = 12;

/// Key length after normalization
const KEY_LEN: usize = 32;

/// Payload encryption configuration
///
/// Key material is accepted in any of three forms: 32 raw bytes, a
/// 64-character hex string, or a base64 string decoding to 32 bytes.
#[derive(Clone, Debug)]
pub struct EncryptionConfig {
    /// Key used to seal new payloads (and tried first when opening)
    pub key: Vec<u8>,

    /// Older keys still accepted when opening payloads
    pub previous_keys: Vec<Vec<u8>>,

    /// Accept stored payloads that predate encryption adoption. They are
    /// re-persisted encrypted the first time they are read.
    pub allow_plaintext: bool,
}

impl EncryptionConfig {
    /// Create a configuration sealing under the given key
    pub fn new(key: impl AsRef<[u8]>) -> Self {
        Self {
            key: key.as_ref().to_vec(),
            previous_keys: Vec::new(),
            allow_plaintext: false,
        }
    }

    /// Add a previous key accepted during decryption
    pub fn with_previous_key(mut self, key: impl AsRef<[u8]>) -> Self {
        self.previous_keys.push(key.as_ref().to_vec());
        self
    }

    /// Set whether pre-encryption plaintext payloads are accepted
    pub fn with_allow_plaintext(mut self, allow: bool) -> Self {
        self.allow_plaintext = allow;
        self
    }
}

/// Resolve key material to exactly 32 raw bytes.
///
/// A 64-char hex string wins over base64 (hex is unambiguous at that length).
/// A strict base64 decode is honored only when it yields 32 bytes, so 32 raw
/// bytes that happen to be base64-alphabet characters stay raw.
fn normalize_key(input: &[u8]) -> Result<[u8; KEY_LEN], SessionError> {
    let raw = if input.len() == 2 * KEY_LEN && input.iter().all(u8::is_ascii_hexdigit) {
        hex::decode(input)
            .map_err(|e| SessionError::EncryptionConfig(format!("invalid hex key: {}", e)))?
    } else {
        match STANDARD.decode(input) {
            Ok(decoded) if decoded.len() == KEY_LEN => decoded,
            _ => input.to_vec(),
        }
    };

    <[u8; KEY_LEN]>::try_from(raw.as_slice()).map_err(|_| {
        SessionError::EncryptionConfig(
            "encryption key must be 32 raw bytes, 64 hex chars, or base64 of 32 bytes".to_string(),
        )
    })
}

/// Sealed-payload codec configured from an [`EncryptionConfig`]
pub(crate) struct Cipher {
    /// Primary first, previous keys after, in configuration order
    keys: Vec<Aes256Gcm>,
    allow_plaintext: bool,
}

impl Cipher {
    pub(crate) fn new(config: &EncryptionConfig) -> Result<Self, SessionError> {
        if config.key.is_empty() {
            return Err(SessionError::EncryptionConfig(
                "encryption key is required".to_string(),
            ));
        }

        let mut keys = vec![Self::make_cipher(&config.key)?];
        for previous in &config.previous_keys {
            if previous.is_empty() {
                return Err(SessionError::EncryptionConfig(
                    "previous keys must be non-empty".to_string(),
                ));
            }
            keys.push(Self::make_cipher(previous)?);
        }

        Ok(Self {
            keys,
            allow_plaintext: config.allow_plaintext,
        })
    }

    fn make_cipher(material: &[u8]) -> Result<Aes256Gcm, SessionError> {
        let key = normalize_key(material)?;
        Ok(Aes256Gcm::new(&key.into()))
    }

    pub(crate) fn allow_plaintext(&self) -> bool {
        self.allow_plaintext
    }

    /// Whether `payload` carries the envelope version tag.
    pub(crate) fn is_envelope(payload: &str) -> bool {
        payload.starts_with(ENVELOPE_PREFIX)
    }

    /// Seal `plaintext` under the primary key with a fresh random nonce.
    pub(crate) fn encrypt(&self, plaintext: &str) -> Result<String, SessionError> {
        let mut nonce = [0u8; NONCE_LEN];
        rand::rng().fill_bytes(&mut nonce);

        let ciphertext = self.keys[0]
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|_| SessionError::Encryption)?;

        let mut body = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        body.extend_from_slice(&nonce);
        body.extend_from_slice(&ciphertext);

        Ok(format!("{}{}", ENVELOPE_PREFIX, STANDARD.encode(body)))
    }

    /// Open an envelope, trying the primary key first and then each previous
    /// key in order. A payload without the version tag passes through
    /// unchanged when plaintext is allowed.
    pub(crate) fn decrypt(&self, payload: &str) -> Result<String, SessionError> {
        let Some(encoded) = payload.strip_prefix(ENVELOPE_PREFIX) else {
            if self.allow_plaintext {
                return Ok(payload.to_string());
            }
            return Err(SessionError::Decryption);
        };

        let body = STANDARD.decode(encoded).map_err(|_| SessionError::Decryption)?;
        if body.len() <= NONCE_LEN {
            return Err(SessionError::Decryption);
        }

        let (nonce, ciphertext) = body.split_at(NONCE_LEN);
        for key in &self.keys {
            if let Ok(plain) = key.decrypt(Nonce::from_slice(nonce), ciphertext) {
                return String::from_utf8(plain).map_err(|_| SessionError::Decryption);
            }
        }

        Err(SessionError::Decryption)
    }
}
