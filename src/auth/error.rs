//! Error kinds produced by the auth flow.
//!
//! Every variant maps to one coarse, client-safe outcome. Store failures keep
//! their source for logging but never render it.

use std::collections::BTreeMap;
use thiserror::Error;

use super::token;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{message}")]
    InvalidInput {
        message: String,
        fields: BTreeMap<&'static str, &'static str>,
    },
    #[error("{0}")]
    Unauthorized(Unauthorized),
    #[error("email already in use")]
    Conflict,
    #[error("not found")]
    NotFound,
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("invalid or expired token")]
    TokenExpired,
    #[error("storage failure")]
    Store(#[from] anyhow::Error),
}

/// Reasons a request is rejected as unauthenticated.
///
/// Credential failures collapse into a single variant so the response never
/// tells a caller which half of the pair was wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Unauthorized {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("missing refresh token")]
    MissingRefreshToken,
    #[error("invalid refresh token")]
    InvalidRefreshToken,
    #[error("refresh token expired")]
    RefreshTokenExpired,
    #[error("missing access token")]
    MissingAccessToken,
    #[error("invalid access token")]
    InvalidAccessToken,
    #[error("user not found")]
    UserNotFound,
}

impl AuthError {
    pub(crate) fn invalid_input(
        message: impl Into<String>,
        fields: impl IntoIterator<Item = (&'static str, &'static str)>,
    ) -> Self {
        Self::InvalidInput {
            message: message.into(),
            fields: fields.into_iter().collect(),
        }
    }

    /// True when the refresh cookie presented with the request is no longer usable.
    #[must_use]
    pub fn clears_refresh_cookie(&self) -> bool {
        matches!(
            self,
            Self::Unauthorized(
                Unauthorized::InvalidRefreshToken
                    | Unauthorized::RefreshTokenExpired
                    | Unauthorized::UserNotFound
            )
        )
    }
}

impl From<Unauthorized> for AuthError {
    fn from(reason: Unauthorized) -> Self {
        Self::Unauthorized(reason)
    }
}

impl From<token::Error> for AuthError {
    fn from(err: token::Error) -> Self {
        match err {
            token::Error::Expired => Self::TokenExpired,
            _ => Self::InvalidToken,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_errors_fold_into_two_kinds() {
        assert!(matches!(
            AuthError::from(token::Error::Expired),
            AuthError::TokenExpired
        ));
        assert!(matches!(
            AuthError::from(token::Error::InvalidSignature),
            AuthError::InvalidToken
        ));
        assert!(matches!(
            AuthError::from(token::Error::TokenFormat),
            AuthError::InvalidToken
        ));
    }

    #[test]
    fn store_errors_hide_their_source() {
        let err = AuthError::from(anyhow::anyhow!("duplicate key value violates constraint"));
        assert_eq!(err.to_string(), "storage failure");
    }

    #[test]
    fn only_dead_refresh_tokens_clear_the_cookie() {
        assert!(AuthError::from(Unauthorized::RefreshTokenExpired).clears_refresh_cookie());
        assert!(AuthError::from(Unauthorized::InvalidRefreshToken).clears_refresh_cookie());
        assert!(!AuthError::from(Unauthorized::MissingRefreshToken).clears_refresh_cookie());
        assert!(!AuthError::Conflict.clears_refresh_cookie());
    }
}
