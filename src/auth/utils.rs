//! Small helpers for input validation and opaque token handling.

use anyhow::{Context, Result};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use regex::Regex;
use sha2::{Digest, Sha256};

/// Minimum accepted password length, counted in characters.
pub const MIN_PASSWORD_CHARS: usize = 8;

/// Normalize an email for lookup/uniqueness checks.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub(crate) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

pub(crate) fn valid_password(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_CHARS
}

/// Create a new opaque refresh token.
/// The raw value is only handed to the client; the store keeps a hash.
pub(crate) fn generate_refresh_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate refresh token")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// SHA-256 hex digest used to store refresh and reset tokens.
pub(crate) fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email(" Ada@Example.COM "), "ada@example.com");
    }

    #[test]
    fn valid_email_accepts_basic_format() {
        assert!(valid_email("ada@x.com"));
        assert!(valid_email("name.surname@example.co"));
    }

    #[test]
    fn valid_email_rejects_missing_parts() {
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("missing-domain@"));
        assert!(!valid_email("spaces in@x.com"));
    }

    #[test]
    fn password_length_counts_characters() {
        assert!(valid_password("longpassword1"));
        assert!(valid_password("12345678"));
        assert!(!valid_password("1234567"));
        // 4 characters, 8 bytes
        assert!(!valid_password("éééé"));
    }

    #[test]
    fn refresh_token_is_32_random_bytes() -> Result<()> {
        let first = generate_refresh_token()?;
        let second = generate_refresh_token()?;
        assert_ne!(first, second);
        let decoded = Base64UrlUnpadded::decode_vec(&first).map_err(anyhow::Error::msg)?;
        assert_eq!(decoded.len(), 32);
        Ok(())
    }

    #[test]
    fn hash_token_is_stable_hex() {
        let first = hash_token("token");
        assert_eq!(first, hash_token("token"));
        assert_ne!(first, hash_token("other"));
        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
