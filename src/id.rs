//! Session identifier generation.
//!
//! Grounded on `internal/utils/id.go`, which base64-encodes a random UUID.
//! This crate uses a UUID v4 (rather than Go's `uuid.NewV4()`-via-`satori`)
//! and strips the padding, producing the same 22-character URL-safe token
//! shape the reference client expects in the `sid` field.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use uuid::Uuid;

/// Generates a fresh, URL-safe session id.
///
pub fn generate() -> String {
    URL_SAFE_NO_PAD.encode(Uuid::new_v4().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_a_22_character_url_safe_id() {
        let id = generate();

        assert_eq!(id.len(), 22);
        assert!(id.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_'));
    }

    #[test]
    fn generates_unique_ids() {
        assert_ne!(generate(), generate());
    }
}
