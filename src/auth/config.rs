//! Runtime settings for the auth flow.

use chrono::Duration;
use std::{fmt, str::FromStr};

use super::password::DEFAULT_HASH_CONCURRENCY;

const DEFAULT_ACCESS_TTL_SECONDS: i64 = 15 * 60;
const DEFAULT_REFRESH_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
const DEFAULT_RESET_TTL_SECONDS: i64 = 60 * 60;

/// Upper bound for every token lifetime (one year).
pub const MAX_TTL_SECONDS: i64 = 365 * 24 * 60 * 60;

/// Deployment tier; only `production` changes behavior.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }

    #[must_use]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "staging" => Ok(Self::Staging),
            "production" | "prod" => Ok(Self::Production),
            other => Err(format!(
                "invalid environment '{other}', expected development, staging or production"
            )),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    environment: Environment,
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
    reset_ttl_seconds: i64,
    password_hash_concurrency: usize,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new(Environment::default())
    }
}

impl AuthConfig {
    #[must_use]
    pub fn new(environment: Environment) -> Self {
        Self {
            environment,
            access_ttl_seconds: DEFAULT_ACCESS_TTL_SECONDS,
            refresh_ttl_seconds: DEFAULT_REFRESH_TTL_SECONDS,
            reset_ttl_seconds: DEFAULT_RESET_TTL_SECONDS,
            password_hash_concurrency: DEFAULT_HASH_CONCURRENCY,
        }
    }

    #[must_use]
    pub fn with_access_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_ttl_seconds = seconds.clamp(1, MAX_TTL_SECONDS);
        self
    }

    #[must_use]
    pub fn with_refresh_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_ttl_seconds = seconds.clamp(1, MAX_TTL_SECONDS);
        self
    }

    #[must_use]
    pub fn with_reset_ttl_seconds(mut self, seconds: i64) -> Self {
        self.reset_ttl_seconds = seconds.clamp(1, MAX_TTL_SECONDS);
        self
    }

    #[must_use]
    pub fn with_password_hash_concurrency(mut self, permits: usize) -> Self {
        self.password_hash_concurrency = permits;
        self
    }

    #[must_use]
    pub fn environment(&self) -> Environment {
        self.environment
    }

    #[must_use]
    pub fn access_ttl(&self) -> Duration {
        Duration::seconds(self.access_ttl_seconds)
    }

    #[must_use]
    pub fn refresh_ttl(&self) -> Duration {
        Duration::seconds(self.refresh_ttl_seconds)
    }

    /// Refresh cookie `Max-Age`.
    #[must_use]
    pub fn refresh_ttl_seconds(&self) -> i64 {
        self.refresh_ttl_seconds
    }

    #[must_use]
    pub fn reset_ttl(&self) -> Duration {
        Duration::seconds(self.reset_ttl_seconds)
    }

    #[must_use]
    pub fn password_hash_concurrency(&self) -> usize {
        self.password_hash_concurrency
    }

    /// Mark the refresh cookie `Secure`; browsers drop it over plain HTTP.
    #[must_use]
    pub fn refresh_cookie_secure(&self) -> bool {
        self.environment.is_production()
    }

    /// Return raw reset tokens in the forgot-password response.
    #[must_use]
    pub fn echo_reset_token(&self) -> bool {
        !self.environment.is_production()
    }
}
