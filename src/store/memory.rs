//! In-memory adapter for tests and local development.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use super::{
    CredentialStore, HealthCheck, LoginAttempt, LoginAttemptLog, NewGym, PlatformAdmin,
    RefreshTokenRecord, RefreshTokenStore, StoreError, StoreResult, Tenant, TenantDirectory,
    TenantUser,
};
use crate::auth::identity::UserType;
use crate::tenant::{valid_domain, ProvisionError, TenantProvisioner};

#[derive(Debug, Default)]
struct Inner {
    admins: HashMap<Uuid, PlatformAdmin>,
    tenants: HashMap<Uuid, Tenant>,
    // Keyed by (tenant id, user id).
    tenant_users: HashMap<(Uuid, Uuid), TenantUser>,
    refresh_tokens: HashMap<String, RefreshTokenRecord>,
    login_attempts: Vec<LoginAttempt>,
    // Schema name to owning gym id; outlives the gym row like a real schema.
    schemas: HashMap<String, Uuid>,
}

/// Every storage port over one lock-protected map set.
///
/// [`MemoryStore::set_available`] simulates a backend outage: while
/// unavailable every port call fails with [`StoreError::BackendUnavailable`].
#[derive(Debug)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    available: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            available: AtomicBool::new(true),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Inner>> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(StoreError::BackendUnavailable("store offline".to_string()));
        }
        self.inner
            .read()
            .map_err(|_| StoreError::BackendUnavailable("store lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Inner>> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(StoreError::BackendUnavailable("store offline".to_string()));
        }
        self.inner
            .write()
            .map_err(|_| StoreError::BackendUnavailable("store lock poisoned".to_string()))
    }

    /// Seed a platform admin.
    ///
    /// # Errors
    /// Fails with [`StoreError::Conflict`] if the username is taken.
    pub fn insert_platform_admin(&self, admin: PlatformAdmin) -> StoreResult<()> {
        let mut inner = self.write()?;
        if inner.admins.values().any(|a| a.username == admin.username) {
            return Err(StoreError::Conflict(format!(
                "username {} is taken",
                admin.username
            )));
        }
        inner.admins.insert(admin.id, admin);
        Ok(())
    }

    /// Seed a gym row without provisioning it.
    ///
    /// # Errors
    /// Fails with [`StoreError::Conflict`] if the domain is taken.
    pub fn insert_tenant(&self, tenant: Tenant) -> StoreResult<()> {
        let mut inner = self.write()?;
        if inner.tenants.values().any(|t| t.domain == tenant.domain) {
            return Err(StoreError::Conflict(format!(
                "gym domain {} is taken",
                tenant.domain
            )));
        }
        inner.tenants.insert(tenant.id, tenant);
        Ok(())
    }

    /// Seed a gym member.
    ///
    /// # Errors
    /// Fails with [`StoreError::Conflict`] if username or email is taken within the gym.
    pub fn insert_tenant_user(&self, user: TenantUser) -> StoreResult<()> {
        let mut inner = self.write()?;
        let taken = inner.tenant_users.values().any(|u| {
            u.tenant_id == user.tenant_id && (u.username == user.username || u.email == user.email)
        });
        if taken {
            return Err(StoreError::Conflict(format!(
                "username {} is taken",
                user.username
            )));
        }
        inner.tenant_users.insert((user.tenant_id, user.id), user);
        Ok(())
    }

    /// Apply `change` to a stored gym member. Returns `false` if absent.
    ///
    /// # Errors
    /// Fails only when the store is unavailable.
    pub fn update_tenant_user(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        change: impl FnOnce(&mut TenantUser),
    ) -> StoreResult<bool> {
        let mut inner = self.write()?;
        Ok(inner
            .tenant_users
            .get_mut(&(tenant_id, user_id))
            .map(change)
            .is_some())
    }

    /// Apply `change` to a stored platform admin. Returns `false` if absent.
    ///
    /// # Errors
    /// Fails only when the store is unavailable.
    pub fn update_platform_admin(
        &self,
        id: Uuid,
        change: impl FnOnce(&mut PlatformAdmin),
    ) -> StoreResult<bool> {
        let mut inner = self.write()?;
        Ok(inner.admins.get_mut(&id).map(change).is_some())
    }

    /// Flip a gym's active flag. Returns `false` if absent.
    ///
    /// # Errors
    /// Fails only when the store is unavailable.
    pub fn set_tenant_active(&self, id: Uuid, is_active: bool) -> StoreResult<bool> {
        let mut inner = self.write()?;
        Ok(inner
            .tenants
            .get_mut(&id)
            .map(|tenant| tenant.is_active = is_active)
            .is_some())
    }

    /// Snapshot of every stored refresh token, expired ones included.
    ///
    /// # Errors
    /// Fails only when the store is unavailable.
    pub fn refresh_tokens(&self) -> StoreResult<Vec<RefreshTokenRecord>> {
        Ok(self.read()?.refresh_tokens.values().cloned().collect())
    }

    /// Snapshot of the login-attempt log in insertion order.
    ///
    /// # Errors
    /// Fails only when the store is unavailable.
    pub fn login_attempts(&self) -> StoreResult<Vec<LoginAttempt>> {
        Ok(self.read()?.login_attempts.clone())
    }

    /// Whether a schema was provisioned for `domain`.
    ///
    /// # Errors
    /// Fails only when the store is unavailable.
    pub fn has_schema(&self, domain: &str) -> StoreResult<bool> {
        Ok(self.read()?.schemas.contains_key(domain))
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_platform_admin_by_username(
        &self,
        username: &str,
    ) -> StoreResult<Option<PlatformAdmin>> {
        Ok(self
            .read()?
            .admins
            .values()
            .find(|admin| admin.username == username)
            .cloned())
    }

    async fn find_platform_admin_by_id(&self, id: Uuid) -> StoreResult<Option<PlatformAdmin>> {
        Ok(self.read()?.admins.get(&id).cloned())
    }

    async fn find_tenant_user_by_username(
        &self,
        tenant: &Tenant,
        username: &str,
    ) -> StoreResult<Option<TenantUser>> {
        Ok(self
            .read()?
            .tenant_users
            .values()
            .find(|user| user.tenant_id == tenant.id && user.username == username)
            .cloned())
    }

    async fn find_tenant_user_by_id(
        &self,
        tenant: &Tenant,
        id: Uuid,
    ) -> StoreResult<Option<TenantUser>> {
        Ok(self.read()?.tenant_users.get(&(tenant.id, id)).cloned())
    }

    async fn touch_platform_admin_last_login(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        if let Some(admin) = self.write()?.admins.get_mut(&id) {
            admin.last_login_at = Some(at);
        }
        Ok(())
    }

    async fn touch_tenant_user_last_login(
        &self,
        tenant: &Tenant,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        if let Some(user) = self.write()?.tenant_users.get_mut(&(tenant.id, id)) {
            user.last_login_at = Some(at);
        }
        Ok(())
    }
}

#[async_trait]
impl TenantDirectory for MemoryStore {
    async fn find_tenant_by_domain(&self, domain: &str) -> StoreResult<Option<Tenant>> {
        Ok(self
            .read()?
            .tenants
            .values()
            .find(|tenant| tenant.domain == domain)
            .cloned())
    }

    async fn find_tenant_by_id(&self, id: Uuid) -> StoreResult<Option<Tenant>> {
        Ok(self.read()?.tenants.get(&id).cloned())
    }

    async fn create_tenant(&self, gym: &NewGym) -> StoreResult<Tenant> {
        let tenant = Tenant {
            id: Uuid::new_v4(),
            name: gym.name.clone(),
            domain: gym.domain.clone(),
            is_active: true,
            created_at: Utc::now(),
        };
        self.insert_tenant(tenant.clone())?;
        Ok(tenant)
    }

    async fn delete_tenant(&self, id: Uuid) -> StoreResult<()> {
        let mut inner = self.write()?;
        if inner.tenants.remove(&id).is_some() {
            inner.tenant_users.retain(|(tenant_id, _), _| *tenant_id != id);
            inner
                .refresh_tokens
                .retain(|_, record| record.tenant_id != Some(id));
        }
        Ok(())
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryStore {
    async fn put(&self, record: &RefreshTokenRecord) -> StoreResult<()> {
        let mut inner = self.write()?;
        let identity = record.identity();
        inner
            .refresh_tokens
            .retain(|_, existing| existing.identity() != identity);
        inner
            .refresh_tokens
            .insert(record.token.clone(), record.clone());
        Ok(())
    }

    async fn lookup(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<RefreshTokenRecord>> {
        Ok(self
            .read()?
            .refresh_tokens
            .get(token)
            .filter(|record| record.is_live(now))
            .cloned())
    }

    async fn revoke(&self, token: &str) -> StoreResult<()> {
        self.write()?.refresh_tokens.remove(token);
        Ok(())
    }

    async fn revoke_all(&self, user_id: Uuid, user_type: UserType) -> StoreResult<u64> {
        let mut inner = self.write()?;
        let before = inner.refresh_tokens.len();
        inner
            .refresh_tokens
            .retain(|_, record| !(record.user_id == user_id && record.user_type == user_type));
        Ok((before - inner.refresh_tokens.len()) as u64)
    }

    async fn sweep(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let mut inner = self.write()?;
        let before = inner.refresh_tokens.len();
        inner.refresh_tokens.retain(|_, record| record.is_live(now));
        Ok((before - inner.refresh_tokens.len()) as u64)
    }
}

#[async_trait]
impl LoginAttemptLog for MemoryStore {
    async fn record(&self, attempt: &LoginAttempt) -> StoreResult<()> {
        self.write()?.login_attempts.push(attempt.clone());
        Ok(())
    }
}

#[async_trait]
impl HealthCheck for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        self.read().map(|_| ())
    }
}

#[async_trait]
impl TenantProvisioner for MemoryStore {
    async fn provision(&self, tenant: &Tenant) -> Result<(), ProvisionError> {
        if !valid_domain(&tenant.domain) {
            return Err(ProvisionError::InvalidDomain);
        }
        let mut inner = self
            .write()
            .map_err(|err| ProvisionError::Failed(err.to_string()))?;
        match inner.schemas.get(&tenant.domain) {
            Some(owner) if *owner == tenant.id => return Ok(()),
            Some(_) => return Err(ProvisionError::NamespaceTaken(tenant.domain.clone())),
            None => {}
        }
        inner.schemas.insert(tenant.domain.clone(), tenant.id);
        Ok(())
    }
}
