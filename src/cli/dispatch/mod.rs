use crate::{
    api::ServerConfig,
    cli::{
        actions::{server::Args, Action},
        commands::{self, auth},
    },
};
use anyhow::{Context, Result};

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches
        .get_one::<u16>(commands::ARG_PORT)
        .copied()
        .unwrap_or(8080);
    let dsn = matches
        .get_one::<String>(commands::ARG_DSN)
        .cloned()
        .context("missing required argument: --dsn")?;
    let db_max_connections = matches
        .get_one::<u32>(commands::ARG_DB_MAX_CONNECTIONS)
        .copied()
        .unwrap_or(25);
    let allowed_origin = matches
        .get_one::<String>(commands::ARG_ALLOWED_ORIGIN)
        .cloned()
        .unwrap_or_else(|| "http://localhost:5173".to_string());

    let auth = auth::Options::parse(matches)?;

    Ok(Action::Server(Args {
        server: ServerConfig {
            port,
            dsn,
            db_max_connections,
            allowed_origin,
        },
        auth,
    }))
}
