use chrono::Duration as ChronoDuration;
use std::time::Duration;

/// Hard ceiling on access-token lifetime.
pub const MAX_ACCESS_TOKEN_TTL_SECONDS: i64 = 24 * 60 * 60;
/// Ceiling for refresh-token lifetime and the demo window, keeping every
/// `now + lifetime` well inside the timestamp range.
pub const MAX_LIFETIME_SECONDS: i64 = 10 * 365 * 24 * 60 * 60;
const DEFAULT_REFRESH_TOKEN_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
const DEFAULT_DEMO_WINDOW_SECONDS: i64 = 14 * 24 * 60 * 60;
const DEFAULT_STORE_TIMEOUT_MS: u64 = 5_000;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    access_token_ttl_seconds: i64,
    refresh_token_ttl_seconds: i64,
    demo_window_seconds: i64,
    store_timeout_ms: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            access_token_ttl_seconds: MAX_ACCESS_TOKEN_TTL_SECONDS,
            refresh_token_ttl_seconds: DEFAULT_REFRESH_TOKEN_TTL_SECONDS,
            demo_window_seconds: DEFAULT_DEMO_WINDOW_SECONDS,
            store_timeout_ms: DEFAULT_STORE_TIMEOUT_MS,
        }
    }

    /// Clamped to `1..=24h`.
    #[must_use]
    pub fn with_access_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_token_ttl_seconds = seconds.clamp(1, MAX_ACCESS_TOKEN_TTL_SECONDS);
        self
    }

    /// Clamped to `1..=10y`.
    #[must_use]
    pub fn with_refresh_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_token_ttl_seconds = seconds.clamp(1, MAX_LIFETIME_SECONDS);
        self
    }

    /// Clamped to `0..=10y`.
    #[must_use]
    pub fn with_demo_window_seconds(mut self, seconds: i64) -> Self {
        self.demo_window_seconds = seconds.clamp(0, MAX_LIFETIME_SECONDS);
        self
    }

    #[must_use]
    pub fn with_store_timeout_ms(mut self, millis: u64) -> Self {
        self.store_timeout_ms = millis.max(1);
        self
    }

    #[must_use]
    pub fn access_token_ttl(&self) -> ChronoDuration {
        ChronoDuration::seconds(self.access_token_ttl_seconds)
    }

    #[must_use]
    pub fn refresh_token_ttl(&self) -> ChronoDuration {
        ChronoDuration::seconds(self.refresh_token_ttl_seconds)
    }

    #[must_use]
    pub fn demo_window(&self) -> ChronoDuration {
        ChronoDuration::seconds(self.demo_window_seconds)
    }

    #[must_use]
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = AuthConfig::new();
        assert_eq!(config.access_token_ttl(), ChronoDuration::hours(24));
        assert_eq!(config.refresh_token_ttl(), ChronoDuration::days(7));
        assert_eq!(config.demo_window(), ChronoDuration::days(14));
        assert_eq!(config.store_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn access_ttl_is_capped_at_a_day() {
        let config = AuthConfig::new().with_access_token_ttl_seconds(7 * 24 * 60 * 60);
        assert_eq!(config.access_token_ttl(), ChronoDuration::hours(24));

        let config = AuthConfig::new().with_access_token_ttl_seconds(900);
        assert_eq!(config.access_token_ttl(), ChronoDuration::minutes(15));
    }

    #[test]
    fn lifetimes_are_capped() {
        let config = AuthConfig::new()
            .with_refresh_token_ttl_seconds(10_000_000_000_000)
            .with_demo_window_seconds(i64::MAX);
        assert_eq!(
            config.refresh_token_ttl(),
            ChronoDuration::seconds(MAX_LIFETIME_SECONDS)
        );
        assert_eq!(
            config.demo_window(),
            ChronoDuration::seconds(MAX_LIFETIME_SECONDS)
        );

        let config = AuthConfig::new().with_demo_window_seconds(-5);
        assert_eq!(config.demo_window(), ChronoDuration::zero());
    }
}
