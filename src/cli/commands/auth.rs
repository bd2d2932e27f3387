use anyhow::{bail, Context, Result};
use clap::{Arg, Command};
use secrecy::SecretString;

use crate::api::AppEnv;
use crate::auth::{MAX_ACCESS_TOKEN_TTL_SECONDS, MAX_LIFETIME_SECONDS};

pub const ARG_JWT_SECRET: &str = "jwt-secret";
pub const ARG_APP_ENV: &str = "app-env";
pub const ARG_ACCESS_TOKEN_TTL: &str = "access-token-ttl-seconds";
pub const ARG_REFRESH_TOKEN_TTL: &str = "refresh-token-ttl-seconds";
pub const ARG_DEMO_WINDOW: &str = "demo-window-seconds";
pub const ARG_REFRESH_SWEEP_INTERVAL: &str = "refresh-sweep-interval-seconds";
pub const ARG_STORE_TIMEOUT_MS: &str = "store-timeout-ms";

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_token_args(command);
    with_runtime_args(command)
}

fn with_token_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_JWT_SECRET)
                .long(ARG_JWT_SECRET)
                .help("HMAC key used to sign access and refresh tokens")
                .env("JWT_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_ACCESS_TOKEN_TTL)
                .long(ARG_ACCESS_TOKEN_TTL)
                .help("Access token lifetime in seconds (at most 86400)")
                .env("SPOTTER_ACCESS_TOKEN_TTL_SECONDS")
                .default_value("86400")
                .value_parser(clap::value_parser!(i64).range(1..=MAX_ACCESS_TOKEN_TTL_SECONDS)),
        )
        .arg(
            Arg::new(ARG_REFRESH_TOKEN_TTL)
                .long(ARG_REFRESH_TOKEN_TTL)
                .help("Refresh token lifetime in seconds")
                .env("SPOTTER_REFRESH_TOKEN_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(i64).range(1..=MAX_LIFETIME_SECONDS)),
        )
        .arg(
            Arg::new(ARG_DEMO_WINDOW)
                .long(ARG_DEMO_WINDOW)
                .help("Demo account lifetime in seconds, counted from account creation")
                .env("SPOTTER_DEMO_WINDOW_SECONDS")
                .default_value("1209600")
                .value_parser(clap::value_parser!(i64).range(1..=MAX_LIFETIME_SECONDS)),
        )
}

fn with_runtime_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_APP_ENV)
                .long(ARG_APP_ENV)
                .help("Deployment mode; `dev` includes inner error text in responses")
                .env("APP_ENV")
                .default_value("production"),
        )
        .arg(
            Arg::new(ARG_REFRESH_SWEEP_INTERVAL)
                .long(ARG_REFRESH_SWEEP_INTERVAL)
                .help("Interval between expired refresh token sweeps, in seconds")
                .env("SPOTTER_REFRESH_SWEEP_INTERVAL_SECONDS")
                .default_value("3600")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_STORE_TIMEOUT_MS)
                .long(ARG_STORE_TIMEOUT_MS)
                .help("Deadline for each credential or token store call, in milliseconds")
                .env("SPOTTER_STORE_TIMEOUT_MS")
                .default_value("5000")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}

#[derive(Debug)]
pub struct Options {
    pub jwt_secret: SecretString,
    pub app_env: AppEnv,
    pub access_token_ttl_seconds: i64,
    pub refresh_token_ttl_seconds: i64,
    pub demo_window_seconds: i64,
    pub refresh_sweep_interval_seconds: u64,
    pub store_timeout_ms: u64,
}

impl Options {
    /// # Errors
    /// Returns an error if the signing secret is missing or blank.
    pub fn parse(matches: &clap::ArgMatches) -> Result<Self> {
        let secret = matches
            .get_one::<String>(ARG_JWT_SECRET)
            .context("missing required argument: --jwt-secret")?;
        if secret.trim().is_empty() {
            bail!("JWT_SECRET must not be empty");
        }

        let app_env = matches
            .get_one::<String>(ARG_APP_ENV)
            .map(|value| value.parse::<AppEnv>().unwrap_or_default())
            .unwrap_or_default();

        Ok(Self {
            jwt_secret: SecretString::from(secret.clone()),
            app_env,
            access_token_ttl_seconds: int_arg(matches, ARG_ACCESS_TOKEN_TTL, 86_400),
            refresh_token_ttl_seconds: int_arg(matches, ARG_REFRESH_TOKEN_TTL, 604_800),
            demo_window_seconds: int_arg(matches, ARG_DEMO_WINDOW, 1_209_600),
            refresh_sweep_interval_seconds: matches
                .get_one::<u64>(ARG_REFRESH_SWEEP_INTERVAL)
                .copied()
                .unwrap_or(3600),
            store_timeout_ms: matches
                .get_one::<u64>(ARG_STORE_TIMEOUT_MS)
                .copied()
                .unwrap_or(5000),
        })
    }
}

fn int_arg(matches: &clap::ArgMatches, name: &str, default: i64) -> i64 {
    matches.get_one::<i64>(name).copied().unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn command() -> Command {
        with_args(Command::new("spotter"))
    }

    #[test]
    fn defaults_apply() -> Result<()> {
        temp_env::with_vars(
            [
                ("JWT_SECRET", Some("s3cret")),
                ("APP_ENV", None),
                ("SPOTTER_ACCESS_TOKEN_TTL_SECONDS", None),
                ("SPOTTER_REFRESH_TOKEN_TTL_SECONDS", None),
                ("SPOTTER_DEMO_WINDOW_SECONDS", None),
                ("SPOTTER_REFRESH_SWEEP_INTERVAL_SECONDS", None),
                ("SPOTTER_STORE_TIMEOUT_MS", None),
            ],
            || {
                let matches = command().try_get_matches_from(vec!["spotter"])?;
                let options = Options::parse(&matches)?;
                assert_eq!(options.jwt_secret.expose_secret(), "s3cret");
                assert_eq!(options.app_env, AppEnv::Production);
                assert_eq!(options.access_token_ttl_seconds, 86_400);
                assert_eq!(options.refresh_token_ttl_seconds, 604_800);
                assert_eq!(options.demo_window_seconds, 1_209_600);
                assert_eq!(options.refresh_sweep_interval_seconds, 3600);
                assert_eq!(options.store_timeout_ms, 5000);
                Ok(())
            },
        )
    }

    #[test]
    fn app_env_dev_from_env() -> Result<()> {
        temp_env::with_vars(
            [("JWT_SECRET", Some("s3cret")), ("APP_ENV", Some("dev"))],
            || {
                let matches = command().try_get_matches_from(vec!["spotter"])?;
                assert_eq!(Options::parse(&matches)?.app_env, AppEnv::Dev);
                Ok(())
            },
        )
    }

    #[test]
    fn missing_secret_is_a_parse_error() {
        temp_env::with_var("JWT_SECRET", None::<&str>, || {
            let result = command().try_get_matches_from(vec!["spotter"]);
            assert_eq!(
                result.map_err(|e| e.kind()).err(),
                Some(clap::error::ErrorKind::MissingRequiredArgument)
            );
        });
    }

    #[test]
    fn blank_secret_is_rejected() -> Result<()> {
        temp_env::with_var("JWT_SECRET", Some("   "), || {
            let matches = command().try_get_matches_from(vec!["spotter"])?;
            assert!(Options::parse(&matches).is_err());
            Ok(())
        })
    }

    #[test]
    fn zero_ttl_is_rejected() {
        temp_env::with_var("JWT_SECRET", Some("s3cret"), || {
            let result = command().try_get_matches_from(vec![
                "spotter",
                "--access-token-ttl-seconds",
                "0",
            ]);
            assert!(result.is_err());
        });
    }

    #[test]
    fn oversized_lifetimes_are_rejected() {
        temp_env::with_var("JWT_SECRET", Some("s3cret"), || {
            for (flag, value) in [
                ("--refresh-token-ttl-seconds", "10000000000000"),
                ("--demo-window-seconds", "9223372036854775807"),
                ("--access-token-ttl-seconds", "86401"),
            ] {
                let result = command().try_get_matches_from(vec!["spotter", flag, value]);
                assert!(result.is_err(), "{flag}={value} should be rejected");
            }
        });
    }
}
