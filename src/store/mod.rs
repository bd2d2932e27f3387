//! Storage ports and their adapters.
//!
//! Each port is an `async_trait` object so the service can be wired with the
//! Postgres adapter in production and [`MemoryStore`] in tests. Absent rows are
//! ordinary `Ok(None)` results; only infrastructure failures are errors.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::identity::UserType;
use crate::tenant::TenantProvisioner;

mod memory;
mod models;
pub mod postgres;
mod sweep;

pub use memory::MemoryStore;
pub use models::{LoginAttempt, NewGym, PlatformAdmin, RefreshTokenRecord, Tenant, TenantUser};
pub use sweep::spawn_refresh_sweeper;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),
    #[error("conflict: {0}")]
    Conflict(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::BackendUnavailable(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Read access to both identity populations.
///
/// Inactive records are still returned; the caller decides what `is_active`
/// means so it can check the password first.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_platform_admin_by_username(
        &self,
        username: &str,
    ) -> StoreResult<Option<PlatformAdmin>>;

    async fn find_platform_admin_by_id(&self, id: Uuid) -> StoreResult<Option<PlatformAdmin>>;

    async fn find_tenant_user_by_username(
        &self,
        tenant: &Tenant,
        username: &str,
    ) -> StoreResult<Option<TenantUser>>;

    async fn find_tenant_user_by_id(
        &self,
        tenant: &Tenant,
        id: Uuid,
    ) -> StoreResult<Option<TenantUser>>;

    async fn touch_platform_admin_last_login(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<()>;

    async fn touch_tenant_user_last_login(
        &self,
        tenant: &Tenant,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<()>;
}

/// The gyms table.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    async fn find_tenant_by_domain(&self, domain: &str) -> StoreResult<Option<Tenant>>;

    async fn find_tenant_by_id(&self, id: Uuid) -> StoreResult<Option<Tenant>>;

    /// Insert a gym row. A taken domain is [`StoreError::Conflict`].
    async fn create_tenant(&self, gym: &NewGym) -> StoreResult<Tenant>;

    async fn delete_tenant(&self, id: Uuid) -> StoreResult<()>;
}

/// Live refresh tokens, one per identity.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Insert or replace the record for the record's identity.
    async fn put(&self, record: &RefreshTokenRecord) -> StoreResult<()>;

    /// Returns the record only while `expires_at > now`.
    async fn lookup(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<RefreshTokenRecord>>;

    /// Idempotent; a missing row is success.
    async fn revoke(&self, token: &str) -> StoreResult<()>;

    /// Delete every record of the user across all gyms.
    async fn revoke_all(&self, user_id: Uuid, user_type: UserType) -> StoreResult<u64>;

    /// Delete every record with `expires_at <= now`.
    async fn sweep(&self, now: DateTime<Utc>) -> StoreResult<u64>;
}

#[async_trait]
pub trait LoginAttemptLog: Send + Sync {
    async fn record(&self, attempt: &LoginAttempt) -> StoreResult<()>;
}

/// Liveness probe for the backing store.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn ping(&self) -> StoreResult<()>;
}

/// Concrete adapters the binary wires into the service.
#[derive(Clone)]
pub struct Backends {
    pub credentials: Arc<dyn CredentialStore>,
    pub tenants: Arc<dyn TenantDirectory>,
    pub refresh_tokens: Arc<dyn RefreshTokenStore>,
    pub login_attempts: Arc<dyn LoginAttemptLog>,
    pub provisioner: Arc<dyn TenantProvisioner>,
    pub health: Arc<dyn HealthCheck>,
}

impl Backends {
    /// Every port backed by the same in-memory store.
    #[must_use]
    pub fn in_memory(store: &Arc<MemoryStore>) -> Self {
        Self {
            credentials: store.clone(),
            tenants: store.clone(),
            refresh_tokens: store.clone(),
            login_attempts: store.clone(),
            provisioner: store.clone(),
            health: store.clone(),
        }
    }
}
