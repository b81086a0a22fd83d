//! Compact HMAC-SHA256 signed tokens used for access and password-reset flows.
//!
//! Tokens are three base64url (unpadded) segments joined by `.`:
//! `header.claims.signature`. Validity depends only on the bytes and the server
//! secret, so verification never touches the store.

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Minimum accepted signing secret length in bytes (256 bits).
pub const MIN_SECRET_LEN: usize = 32;

const ALGORITHM: &str = "HS256";
const TOKEN_TYPE: &str = "JWT";

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid token format")]
    TokenFormat,
    #[error("invalid token header")]
    InvalidHeader,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("invalid expiration")]
    InvalidExp,
    #[error("invalid subject")]
    InvalidSubject,
    #[error("token purpose mismatch: expected {expected}, found {found}")]
    WrongPurpose {
        expected: TokenPurpose,
        found: TokenPurpose,
    },
    #[error("signing secret must be at least {MIN_SECRET_LEN} bytes, got {0}")]
    SecretTooShort(usize),
    #[error("invalid signing key")]
    Key,
}

/// What a signed token may be used for. A token is only ever accepted for the
/// purpose it was minted with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenPurpose {
    Access,
    Reset,
}

impl TokenPurpose {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Reset => "reset",
        }
    }
}

impl fmt::Display for TokenPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    typ: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Claims {
    sub: String,
    typ: TokenPurpose,
    iat: i64,
    exp: i64,
}

/// Claims of a token whose signature and expiry have been checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifiedToken {
    pub subject: Uuid,
    pub purpose: TokenPurpose,
    pub issued_at: i64,
    pub expires_at: DateTime<Utc>,
}

/// Signs and verifies tokens with a single server-wide secret.
#[derive(Clone, Debug)]
pub struct TokenCodec {
    secret: SecretString,
}

impl TokenCodec {
    /// # Errors
    /// Returns [`Error::SecretTooShort`] when the secret is under [`MIN_SECRET_LEN`] bytes.
    pub fn new(secret: SecretString) -> Result<Self, Error> {
        let len = secret.expose_secret().len();
        if len < MIN_SECRET_LEN {
            return Err(Error::SecretTooShort(len));
        }
        Ok(Self { secret })
    }

    /// Sign a token for `subject` valid for `ttl` from now.
    ///
    /// # Errors
    /// Returns an error if the expiry overflows or the claims cannot be encoded.
    pub fn sign(&self, subject: Uuid, purpose: TokenPurpose, ttl: Duration) -> Result<String, Error> {
        self.sign_at(subject, purpose, ttl, Utc::now())
    }

    /// Same as [`Self::sign`] with an explicit issue time (second granularity).
    ///
    /// # Errors
    /// Returns an error if the expiry overflows or the claims cannot be encoded.
    pub fn sign_at(
        &self,
        subject: Uuid,
        purpose: TokenPurpose,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<String, Error> {
        let exp = now.checked_add_signed(ttl).ok_or(Error::InvalidExp)?;
        self.encode(&Claims {
            sub: subject.to_string(),
            typ: purpose,
            iat: now.timestamp(),
            exp: exp.timestamp(),
        })
    }

    /// Check signature, structure and expiry.
    ///
    /// # Errors
    /// Returns [`Error::Expired`] for stale tokens and another variant for anything
    /// malformed or not signed with this secret.
    pub fn verify(&self, token: &str) -> Result<VerifiedToken, Error> {
        self.verify_at(token, Utc::now())
    }

    /// Same as [`Self::verify`] against an explicit clock.
    ///
    /// # Errors
    /// See [`Self::verify`].
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<VerifiedToken, Error> {
        let mut segments = token.split('.');
        let (Some(header_b64), Some(claims_b64), Some(signature_b64), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(Error::TokenFormat);
        };

        let signature = Base64UrlUnpadded::decode_vec(signature_b64).map_err(|_| Error::Base64)?;
        let signing_input = &token[..header_b64.len() + 1 + claims_b64.len()];
        // verify_slice compares in constant time
        self.mac(signing_input.as_bytes())?
            .verify_slice(&signature)
            .map_err(|_| Error::InvalidSignature)?;

        let header: Header = b64d_json(header_b64)?;
        if header.alg != ALGORITHM {
            return Err(Error::InvalidHeader);
        }

        let claims: Claims = b64d_json(claims_b64)?;
        if claims.exp < now.timestamp() {
            return Err(Error::Expired);
        }
        let subject = Uuid::parse_str(&claims.sub).map_err(|_| Error::InvalidSubject)?;
        let expires_at = DateTime::from_timestamp(claims.exp, 0).ok_or(Error::InvalidExp)?;

        Ok(VerifiedToken {
            subject,
            purpose: claims.typ,
            issued_at: claims.iat,
            expires_at,
        })
    }

    /// Verify a token and require it to carry `expected` purpose.
    ///
    /// # Errors
    /// Returns [`Error::WrongPurpose`] on mismatch, or any [`Self::verify`] error.
    pub fn verify_purpose(&self, token: &str, expected: TokenPurpose) -> Result<Uuid, Error> {
        self.verify_purpose_at(token, expected, Utc::now())
    }

    /// # Errors
    /// See [`Self::verify_purpose`].
    pub fn verify_purpose_at(
        &self,
        token: &str,
        expected: TokenPurpose,
        now: DateTime<Utc>,
    ) -> Result<Uuid, Error> {
        let verified = self.verify_at(token, now)?;
        if verified.purpose != expected {
            return Err(Error::WrongPurpose {
                expected,
                found: verified.purpose,
            });
        }
        Ok(verified.subject)
    }

    fn encode(&self, claims: &Claims) -> Result<String, Error> {
        let header = Header {
            alg: ALGORITHM.to_string(),
            typ: TOKEN_TYPE.to_string(),
        };
        let header_b64 = b64e_json(&header)?;
        let claims_b64 = b64e_json(claims)?;
        let signing_input = format!("{header_b64}.{claims_b64}");

        let signature = self.mac(signing_input.as_bytes())?.finalize().into_bytes();
        Ok(format!(
            "{signing_input}.{}",
            Base64UrlUnpadded::encode_string(&signature)
        ))
    }

    fn mac(&self, input: &[u8]) -> Result<HmacSha256, Error> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| Error::Key)?;
        mac.update(input);
        Ok(mac)
    }
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, Error> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, Error> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| Error::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn codec(secret: &str) -> Result<TokenCodec> {
        Ok(TokenCodec::new(SecretString::from(secret.to_string()))?)
    }

    fn fixed_now() -> Result<DateTime<Utc>> {
        DateTime::from_timestamp(1_700_000_000, 0).context("valid timestamp")
    }

    #[test]
    fn rejects_short_secret() {
        let result = TokenCodec::new(SecretString::from("too-short".to_string()));
        assert!(matches!(result, Err(Error::SecretTooShort(9))));
    }

    #[test]
    fn sign_then_verify_returns_subject_and_purpose() -> Result<()> {
        let codec = codec(SECRET)?;
        let subject = Uuid::new_v4();
        let token = codec.sign(subject, TokenPurpose::Access, Duration::minutes(15))?;

        let verified = codec.verify(&token)?;
        assert_eq!(verified.subject, subject);
        assert_eq!(verified.purpose, TokenPurpose::Access);
        Ok(())
    }

    #[test]
    fn token_layout_matches_compact_jws() -> Result<()> {
        let codec = codec(SECRET)?;
        let now = fixed_now()?;
        let subject = Uuid::new_v4();
        let token = codec.sign_at(subject, TokenPurpose::Reset, Duration::hours(1), now)?;

        let segments: Vec<&str> = token.split('.').collect();
        assert_eq!(segments.len(), 3);
        assert!(!token.contains('='));

        let header: serde_json::Value = b64d_json(segments[0])?;
        assert_eq!(header["alg"], "HS256");
        assert_eq!(header["typ"], "JWT");

        let claims: serde_json::Value = b64d_json(segments[1])?;
        assert_eq!(claims["sub"], subject.to_string());
        assert_eq!(claims["typ"], "reset");
        assert_eq!(claims["iat"], 1_700_000_000);
        assert_eq!(claims["exp"], 1_700_003_600);
        Ok(())
    }

    #[test]
    fn signing_is_deterministic_for_fixed_inputs() -> Result<()> {
        let codec = codec(SECRET)?;
        let now = fixed_now()?;
        let subject = Uuid::new_v4();
        let first = codec.sign_at(subject, TokenPurpose::Access, Duration::minutes(15), now)?;
        let second = codec.sign_at(subject, TokenPurpose::Access, Duration::minutes(15), now)?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn tampered_signature_is_rejected() -> Result<()> {
        let codec = codec(SECRET)?;
        let token = codec.sign(Uuid::new_v4(), TokenPurpose::Access, Duration::minutes(15))?;

        let (signing_input, signature) = token.rsplit_once('.').context("signature segment")?;
        let mut chars: Vec<char> = signature.chars().collect();
        chars[0] = if chars[0] == 'A' { 'B' } else { 'A' };
        let tampered = format!("{signing_input}.{}", chars.into_iter().collect::<String>());

        assert!(matches!(
            codec.verify(&tampered),
            Err(Error::InvalidSignature)
        ));
        Ok(())
    }

    #[test]
    fn tampered_claims_are_rejected() -> Result<()> {
        let codec = codec(SECRET)?;
        let now = fixed_now()?;
        let token = codec.sign_at(Uuid::new_v4(), TokenPurpose::Reset, Duration::hours(1), now)?;
        let segments: Vec<&str> = token.split('.').collect();

        let forged = b64e_json(&Claims {
            sub: Uuid::new_v4().to_string(),
            typ: TokenPurpose::Access,
            iat: now.timestamp(),
            exp: now.timestamp() + 3600,
        })?;
        let tampered = format!("{}.{forged}.{}", segments[0], segments[2]);

        assert!(matches!(
            codec.verify_at(&tampered, now),
            Err(Error::InvalidSignature)
        ));
        Ok(())
    }

    #[test]
    fn other_secret_cannot_verify() -> Result<()> {
        let issuer = codec(SECRET)?;
        let other = codec("fedcba9876543210fedcba9876543210")?;
        let token = issuer.sign(Uuid::new_v4(), TokenPurpose::Access, Duration::minutes(15))?;
        assert!(matches!(other.verify(&token), Err(Error::InvalidSignature)));
        Ok(())
    }

    #[test]
    fn expired_token_is_reported_as_expired() -> Result<()> {
        let codec = codec(SECRET)?;
        let issued = fixed_now()?;
        let token = codec.sign_at(
            Uuid::new_v4(),
            TokenPurpose::Access,
            Duration::minutes(15),
            issued,
        )?;

        let at_expiry = issued + Duration::minutes(15);
        assert!(codec.verify_at(&token, at_expiry).is_ok());

        let after = at_expiry + Duration::seconds(1);
        assert!(matches!(codec.verify_at(&token, after), Err(Error::Expired)));
        Ok(())
    }

    #[test]
    fn wrong_segment_count_is_a_format_error() -> Result<()> {
        let codec = codec(SECRET)?;
        for token in ["", "abc", "a.b", "a.b.c.d"] {
            assert!(
                matches!(codec.verify(token), Err(Error::TokenFormat | Error::Base64 | Error::InvalidSignature)),
                "token {token:?} should be rejected"
            );
        }
        assert!(matches!(codec.verify("a.b"), Err(Error::TokenFormat)));
        assert!(matches!(codec.verify("a.b.c.d"), Err(Error::TokenFormat)));
        Ok(())
    }

    #[test]
    fn purpose_is_enforced() -> Result<()> {
        let codec = codec(SECRET)?;
        let subject = Uuid::new_v4();
        let reset = codec.sign(subject, TokenPurpose::Reset, Duration::hours(1))?;

        assert_eq!(codec.verify_purpose(&reset, TokenPurpose::Reset)?, subject);
        assert!(matches!(
            codec.verify_purpose(&reset, TokenPurpose::Access),
            Err(Error::WrongPurpose {
                expected: TokenPurpose::Access,
                found: TokenPurpose::Reset
            })
        ));
        Ok(())
    }

    #[test]
    fn non_uuid_subject_is_rejected() -> Result<()> {
        let codec = codec(SECRET)?;
        let now = fixed_now()?;
        let token = codec.encode(&Claims {
            sub: "not-a-uuid".to_string(),
            typ: TokenPurpose::Access,
            iat: now.timestamp(),
            exp: now.timestamp() + 60,
        })?;
        assert!(matches!(
            codec.verify_at(&token, now),
            Err(Error::InvalidSubject)
        ));
        Ok(())
    }
}
