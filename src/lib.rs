//! # Taskflow API
//!
//! Account management service. The design-bearing part is [`auth`]:
//! registration and login with Argon2id password hashes, short-lived signed
//! access tokens, rotating opaque refresh tokens stored as SHA-256 digests, and a
//! password reset flow built on the same signing primitive.
//!
//! [`api`] exposes the flow over HTTP under `/api/v1/auth`; [`cli`] parses
//! configuration and starts the server.

pub mod api;
pub mod auth;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
