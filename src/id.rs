//! Session ID generation and validation
//!
//! A session ID is exactly 32 lowercase hexadecimal characters (16 random
//! bytes). Anything else is rejected: inbound cookie values are attacker
//! controlled and a malformed ID must never reach a backend (a file backend
//! would otherwise turn `../evil` into a path traversal).

use rand::RngCore;

/// Generate a fresh session ID: 16 cryptographically random bytes, hex-encoded.
pub fn generate() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Check that `id` matches `^[a-f0-9]{32}$`.
pub fn is_valid(id: &str) -> bool {
    id.len() == 32
        && id
            .bytes()
            .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_is_valid() {
        let id = generate();
        assert_eq!(id.len(), 32);
        assert!(is_valid(&id));
    }

    #[test]
    fn test_generate_is_unique() {
        assert_ne!(generate(), generate());
    }

    #[test]
    fn test_rejects_malformed_ids() {
        assert!(!is_valid(""));
        assert!(!is_valid("../evil"));
        assert!(!is_valid("ABCDEF0123456789ABCDEF0123456789")); // uppercase
        assert!(!is_valid("zzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzz"));
        assert!(!is_valid("abc123")); // too short
        assert!(!is_valid(&"a".repeat(33)));
    }

    #[test]
    fn test_accepts_well_formed_id() {
        assert!(is_valid("0123456789abcdef0123456789abcdef"));
    }
}
