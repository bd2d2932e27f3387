use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use std::{sync::Arc, time::Duration};
use tracing::{debug, info};

use crate::{
    api::{self, AppEnv},
    auth::{AuthConfig, AuthService, Clock, SystemClock, TokenCodec},
    store::{
        postgres::{self, PgStore},
        spawn_refresh_sweeper, Backends,
    },
    tenant::PgProvisioner,
};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: SecretString,
    pub db_max_connections: u32,
    pub jwt_secret: SecretString,
    pub app_env: AppEnv,
    pub access_token_ttl_seconds: i64,
    pub refresh_token_ttl_seconds: i64,
    pub demo_window_seconds: i64,
    pub refresh_sweep_interval_seconds: u64,
    pub store_timeout_ms: u64,
}

impl Args {
    fn auth_config(&self) -> AuthConfig {
        AuthConfig::new()
            .with_access_token_ttl_seconds(self.access_token_ttl_seconds)
            .with_refresh_token_ttl_seconds(self.refresh_token_ttl_seconds)
            .with_demo_window_seconds(self.demo_window_seconds)
            .with_store_timeout_ms(self.store_timeout_ms)
    }
}

/// Every port backed by one Postgres pool.
fn pg_backends(pool: sqlx::PgPool) -> Backends {
    let store = Arc::new(PgStore::new(pool.clone()));
    Backends {
        credentials: store.clone(),
        tenants: store.clone(),
        refresh_tokens: store.clone(),
        login_attempts: store.clone(),
        provisioner: Arc::new(PgProvisioner::new(pool)),
        health: store,
    }
}

/// Connect, migrate, start the sweeper, and serve until shutdown.
///
/// # Errors
/// Returns an error if the database is unreachable, the global schema cannot
/// be applied, or the server fails.
pub async fn execute(args: Args) -> Result<()> {
    let auth_config = args.auth_config();
    debug!(?auth_config, app_env = %args.app_env, "server configuration");

    let pool = postgres::connect(args.dsn.expose_secret(), args.db_max_connections).await?;
    postgres::migrate(&pool)
        .await
        .context("Failed to apply database schema")?;
    info!("Database schema is up to date");

    let backends = pg_backends(pool);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let codec = TokenCodec::new(&args.jwt_secret);

    let sweeper = spawn_refresh_sweeper(
        backends.refresh_tokens.clone(),
        clock.clone(),
        Duration::from_secs(args.refresh_sweep_interval_seconds),
    );

    let auth = Arc::new(AuthService::new(backends.clone(), codec, clock, auth_config));
    let served = api::new(args.port, auth, backends, args.app_env).await;

    sweeper.abort();
    served
}
