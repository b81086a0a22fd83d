use crate::{
    api::{self, ServerConfig},
    auth::TokenCodec,
    cli::{commands::auth::Options, telemetry},
};
use anyhow::{Context, Result};
use tracing::info;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub server: ServerConfig,
    pub auth: Options,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the signing secret is rejected or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let codec = TokenCodec::new(args.auth.jwt_secret.clone()).context("Invalid signing secret")?;
    let result = api::new(args.server, args.auth.auth_config(), codec).await;

    telemetry::shutdown_tracer();

    result
}

fn log_startup_args(args: &Args) {
    let entries = [
        ("listen", format!("tcp:{}", args.server.port)),
        ("dsn", redact_dsn(&args.server.dsn)),
        (
            "db_max_connections",
            args.server.db_max_connections.to_string(),
        ),
        ("allowed_origin", args.server.allowed_origin.clone()),
        ("environment", args.auth.environment.to_string()),
        ("access_ttl_seconds", args.auth.access_ttl_seconds.to_string()),
        (
            "refresh_ttl_seconds",
            args.auth.refresh_ttl_seconds.to_string(),
        ),
        ("reset_ttl_seconds", args.auth.reset_ttl_seconds.to_string()),
        (
            "password_hash_concurrency",
            args.auth.password_hash_concurrency.to_string(),
        ),
    ];

    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "{} {} ({})\n\nStartup configuration:",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    );
    for (key, value) in &entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid-dsn".to_string(),
    }
}

fn short_commit(hash: &str) -> &str {
    let trimmed = hash.trim();
    trimmed.get(..7).unwrap_or(trimmed)
}
