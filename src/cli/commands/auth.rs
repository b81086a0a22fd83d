use crate::auth::{AuthConfig, Environment, MAX_TTL_SECONDS, MIN_SECRET_LEN};
use anyhow::{Context, Result};
use clap::{builder::ValueParser, Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_JWT_SECRET: &str = "jwt-secret";
pub const ARG_ENVIRONMENT: &str = "environment";
pub const ARG_ACCESS_TOKEN_TTL: &str = "access-token-ttl-seconds";
pub const ARG_REFRESH_TOKEN_TTL: &str = "refresh-token-ttl-seconds";
pub const ARG_RESET_TOKEN_TTL: &str = "reset-token-ttl-seconds";
pub const ARG_PASSWORD_HASH_CONCURRENCY: &str = "password-hash-concurrency";

/// Auth settings collected from the command line and environment.
#[derive(Debug, Clone)]
pub struct Options {
    pub jwt_secret: SecretString,
    pub environment: Environment,
    pub access_ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
    pub reset_ttl_seconds: i64,
    pub password_hash_concurrency: usize,
}

impl Options {
    /// Parse auth arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the signing secret is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let jwt_secret = matches
            .get_one::<String>(ARG_JWT_SECRET)
            .cloned()
            .context("missing required argument: --jwt-secret")?;

        Ok(Self {
            jwt_secret: SecretString::from(jwt_secret),
            environment: matches
                .get_one::<Environment>(ARG_ENVIRONMENT)
                .copied()
                .unwrap_or_default(),
            access_ttl_seconds: matches
                .get_one::<i64>(ARG_ACCESS_TOKEN_TTL)
                .copied()
                .unwrap_or(900),
            refresh_ttl_seconds: matches
                .get_one::<i64>(ARG_REFRESH_TOKEN_TTL)
                .copied()
                .unwrap_or(604_800),
            reset_ttl_seconds: matches
                .get_one::<i64>(ARG_RESET_TOKEN_TTL)
                .copied()
                .unwrap_or(3600),
            password_hash_concurrency: matches
                .get_one::<u16>(ARG_PASSWORD_HASH_CONCURRENCY)
                .copied()
                .map_or(crate::auth::DEFAULT_HASH_CONCURRENCY, usize::from),
        })
    }

    #[must_use]
    pub fn auth_config(&self) -> AuthConfig {
        AuthConfig::new(self.environment)
            .with_access_ttl_seconds(self.access_ttl_seconds)
            .with_refresh_ttl_seconds(self.refresh_ttl_seconds)
            .with_reset_ttl_seconds(self.reset_ttl_seconds)
            .with_password_hash_concurrency(self.password_hash_concurrency)
    }
}

fn validator_secret() -> ValueParser {
    ValueParser::from(move |secret: &str| -> std::result::Result<String, String> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(format!(
                "signing secret must be at least {MIN_SECRET_LEN} bytes"
            ));
        }
        Ok(secret.to_string())
    })
}

fn validator_environment() -> ValueParser {
    ValueParser::from(move |value: &str| value.parse::<Environment>())
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_JWT_SECRET)
                .long(ARG_JWT_SECRET)
                .help("HMAC-SHA256 secret used to sign access and reset tokens")
                .env("TASKFLOW_JWT_SECRET")
                .hide_env_values(true)
                .required(true)
                .value_parser(validator_secret()),
        )
        .arg(
            Arg::new(ARG_ENVIRONMENT)
                .long(ARG_ENVIRONMENT)
                .help("Deployment environment: development, staging, production")
                .long_help(
                    "Deployment environment. In production the refresh cookie is marked Secure and reset tokens are never echoed in responses.",
                )
                .env("TASKFLOW_ENV")
                .default_value("development")
                .value_parser(validator_environment()),
        )
        .arg(
            Arg::new(ARG_ACCESS_TOKEN_TTL)
                .long(ARG_ACCESS_TOKEN_TTL)
                .help("Access token TTL in seconds")
                .env("TASKFLOW_ACCESS_TOKEN_TTL_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(i64).range(1..=MAX_TTL_SECONDS)),
        )
        .arg(
            Arg::new(ARG_REFRESH_TOKEN_TTL)
                .long(ARG_REFRESH_TOKEN_TTL)
                .help("Refresh token and cookie TTL in seconds")
                .env("TASKFLOW_REFRESH_TOKEN_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(i64).range(1..=MAX_TTL_SECONDS)),
        )
        .arg(
            Arg::new(ARG_RESET_TOKEN_TTL)
                .long(ARG_RESET_TOKEN_TTL)
                .help("Password reset token TTL in seconds")
                .env("TASKFLOW_RESET_TOKEN_TTL_SECONDS")
                .default_value("3600")
                .value_parser(clap::value_parser!(i64).range(1..=MAX_TTL_SECONDS)),
        )
        .arg(
            Arg::new(ARG_PASSWORD_HASH_CONCURRENCY)
                .long(ARG_PASSWORD_HASH_CONCURRENCY)
                .help("Maximum concurrent Argon2 hash or verify operations")
                .env("TASKFLOW_PASSWORD_HASH_CONCURRENCY")
                .default_value("4")
                .value_parser(clap::value_parser!(u16).range(1..)),
        )
}
