//! Bearer secret and verification token handling.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::AppError;

/// Every issued key starts with this prefix.
pub const KEY_PREFIX: &str = "ev_";

/// Generate a new bearer secret: `ev_` followed by a random UUID.
pub fn generate_key_value() -> String {
    format!("{}{}", KEY_PREFIX, Uuid::new_v4())
}

/// Generate an unguessable verification token (32 random bytes, hex encoded).
pub fn generate_verification_token() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

/// SHA-256 hex digest used to store secrets and tokens.
pub fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Masked form of a key: first four and last four characters.
///
/// Short values are masked entirely.
pub fn mask_key(key_value: &str) -> String {
    let chars: Vec<char> = key_value.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }

    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Extract the key from an `Authorization: Bearer ev_...` header value.
///
/// # Errors
///
/// `MissingOrMalformedCredential` when the header is absent, is not a bearer
/// credential, or does not carry an `ev_` key.
pub fn parse_bearer(header: Option<&str>) -> Result<&str, AppError> {
    let key = header
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .ok_or(AppError::MissingOrMalformedCredential)?;

    if key.len() <= KEY_PREFIX.len() || !key.starts_with(KEY_PREFIX) {
        return Err(AppError::MissingOrMalformedCredential);
    }

    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_are_prefixed_and_distinct() {
        let a = generate_key_value();
        let b = generate_key_value();

        assert!(a.starts_with("ev_"));
        assert_eq!(a.len(), 3 + 36);
        assert_ne!(a, b);
    }

    #[test]
    fn tokens_are_64_hex_chars() {
        let token = generate_verification_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn mask_keeps_only_the_edges() {
        let key = "ev_6f1c2f0e-0d5a-4e57-9a43-3c0e7a5c9b21";
        let masked = mask_key(key);

        assert_eq!(masked, "ev_6...9b21");
        assert!(!masked.contains("0d5a"));
        assert_eq!(mask_key("ev_12"), "*****");
    }

    #[test]
    fn hashing_is_stable_and_hides_input() {
        let hash = hash_secret("ev_secret");
        assert_eq!(hash, hash_secret("ev_secret"));
        assert_eq!(hash.len(), 64);
        assert!(!hash.contains("secret"));
    }

    #[test]
    fn bearer_parsing() {
        assert_eq!(parse_bearer(Some("Bearer ev_abc")).unwrap(), "ev_abc");

        for bad in [
            None,
            Some(""),
            Some("ev_abc"),
            Some("Basic ev_abc"),
            Some("Bearer "),
            Some("Bearer ev_"),
            Some("Bearer sk_abc"),
        ] {
            assert!(matches!(
                parse_bearer(bad),
                Err(AppError::MissingOrMalformedCredential)
            ));
        }
    }
}
