use std::{sync::Arc, time::Duration};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use super::RefreshTokenStore;
use crate::auth::clock::Clock;

/// Periodically delete expired refresh tokens.
///
/// A tick missed while a sweep is still running is dropped, not replayed.
pub fn spawn_refresh_sweeper(
    store: Arc<dyn RefreshTokenStore>,
    clock: Arc<dyn Clock>,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            match store.sweep(clock.now()).await {
                Ok(0) => debug!("refresh token sweep found nothing"),
                Ok(removed) => info!(removed, "swept expired refresh tokens"),
                Err(err) => error!("refresh token sweep failed: {err}"),
            }
        }
    })
}
