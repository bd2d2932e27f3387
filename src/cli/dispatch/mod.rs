//! Maps parsed arguments to the action the binary runs.

use anyhow::{Context, Result};
use secrecy::SecretString;

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{auth, ARG_DB_MAX_CONNECTIONS, ARG_DSN, ARG_PORT};

/// # Errors
/// Returns an error if a required argument is missing or invalid.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .cloned()
        .context("missing required argument: --dsn")?;
    let db_max_connections = matches
        .get_one::<u32>(ARG_DB_MAX_CONNECTIONS)
        .copied()
        .unwrap_or(10);

    let auth_opts = auth::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn: SecretString::from(dsn),
        db_max_connections,
        jwt_secret: auth_opts.jwt_secret,
        app_env: auth_opts.app_env,
        access_token_ttl_seconds: auth_opts.access_token_ttl_seconds,
        refresh_token_ttl_seconds: auth_opts.refresh_token_ttl_seconds,
        demo_window_seconds: auth_opts.demo_window_seconds,
        refresh_sweep_interval_seconds: auth_opts.refresh_sweep_interval_seconds,
        store_timeout_ms: auth_opts.store_timeout_ms,
    }))
}
