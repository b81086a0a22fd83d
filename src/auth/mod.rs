//! # Authentication and sessions
//!
//! Accounts sign in with an email and an Argon2id-hashed password and receive two
//! credentials:
//!
//! - a short-lived **access token** (HMAC-SHA256 signed, purpose `access`) that is
//!   verified offline on every request;
//! - a long-lived opaque **refresh token** whose SHA-256 digest is stored. Each use
//!   consumes the stored row and issues a replacement, so a replayed token is
//!   rejected.
//!
//! Password resets reuse the signing primitive with purpose `reset`; the latest
//! reset token hash is stored on the user and cleared when the password changes.

mod config;
mod error;
mod issuer;
mod memory;
mod models;
mod password;
mod repo;
mod service;
mod store;
pub mod token;
mod utils;

pub use config::{AuthConfig, Environment, MAX_TTL_SECONDS};
pub use error::{AuthError, Unauthorized};
pub use issuer::{IssuedSession, SessionIssuer};
pub use memory::MemoryCredentialStore;
pub use models::{NewUser, Principal, RefreshTokenRecord, SignupOutcome, User};
pub use password::{PasswordHasher, DEFAULT_HASH_CONCURRENCY};
pub use repo::PgCredentialStore;
pub use service::{AuthService, ForgotPasswordOutcome, SessionOutcome, FORGOT_PASSWORD_MESSAGE};
pub use store::CredentialStore;
pub use token::{TokenCodec, TokenPurpose, VerifiedToken, MIN_SECRET_LEN};
pub use utils::MIN_PASSWORD_CHARS;
