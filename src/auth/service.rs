//! Login, refresh, logout, and access-token validation.
//!
//! Access tokens are checked by signature and expiry only. Refresh tokens are
//! also looked up in the refresh-token store, and refresh re-reads the user so
//! role or activation changes show up in the next access token.

use chrono::{DateTime, Utc};
use std::{future::Future, sync::Arc, time::Duration};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::authz::demo_window_elapsed;
use super::claims::{AccessClaims, RefreshClaims};
use super::clock::Clock;
use super::config::AuthConfig;
use super::error::AuthError;
use super::identity::{Role, UserType, VerificationStatus};
use super::password::{dummy_hash, verify_password};
use super::token::{TokenCodec, TokenError};
use super::types::{AuthResponse, LoginContext, UserInfo, ValidateResponse};
use crate::store::{
    Backends, LoginAttempt, PlatformAdmin, RefreshTokenRecord, StoreError, StoreResult, Tenant,
    TenantUser,
};
use crate::tenant::valid_domain;

const INVALID_REFRESH_TOKEN: &str = "invalid refresh token";

/// Run a store call under `deadline`; running out is a backend failure.
///
/// # Errors
/// Returns the call's own error, or [`StoreError::BackendUnavailable`] on timeout.
pub async fn with_deadline<T, F>(deadline: Duration, call: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    tokio::time::timeout(deadline, call).await.map_err(|_| {
        StoreError::BackendUnavailable(format!(
            "store call exceeded {}ms deadline",
            deadline.as_millis()
        ))
    })?
}

/// A rejected login plus whatever identity was resolved before rejecting it.
struct LoginFailure {
    error: AuthError,
    user_id: Option<Uuid>,
    tenant_id: Option<Uuid>,
}

impl LoginFailure {
    fn new(error: AuthError, user_id: Option<Uuid>, tenant_id: Option<Uuid>) -> Self {
        Self {
            error,
            user_id,
            tenant_id,
        }
    }

    fn anonymous(error: AuthError) -> Self {
        Self::new(error, None, None)
    }
}

/// The principal a refresh token resolves to after re-reading storage.
enum Principal {
    Admin(PlatformAdmin),
    Member(TenantUser, Tenant),
}

pub struct AuthService {
    backends: Backends,
    codec: TokenCodec,
    clock: Arc<dyn Clock>,
    config: AuthConfig,
}

impl AuthService {
    #[must_use]
    pub fn new(
        backends: Backends,
        codec: TokenCodec,
        clock: Arc<dyn Clock>,
        config: AuthConfig,
    ) -> Self {
        Self {
            backends,
            codec,
            clock,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    async fn store<T, F>(&self, call: F) -> Result<T, AuthError>
    where
        F: Future<Output = StoreResult<T>>,
    {
        Ok(with_deadline(self.config.store_timeout(), call).await?)
    }

    /// Authenticate `username`/`password` against the population picked by
    /// `context.tenant_domain`.
    ///
    /// # Errors
    /// Returns [`AuthError`] for bad credentials, disabled or expired accounts,
    /// and backend failures.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        context: &LoginContext,
    ) -> Result<AuthResponse, AuthError> {
        let (user_type, result) = match context.tenant_domain.as_deref() {
            None => (
                UserType::PlatformAdmin,
                self.login_platform_admin(username, password).await,
            ),
            Some(domain) => (
                UserType::TenantUser,
                self.login_tenant_user(domain, username, password).await,
            ),
        };

        let attempt = |user_id, tenant_id, success| LoginAttempt {
            user_id,
            user_type,
            tenant_id,
            success,
            client_ip: context.client_ip.clone(),
            attempted_at: self.now(),
        };

        match result {
            Ok(response) => {
                self.record_attempt(attempt(
                    Some(response.user_info.id),
                    response.user_info.tenant_id,
                    true,
                ))
                .await;
                info!(user_id = %response.user_info.id, %user_type, "login succeeded");
                Ok(response)
            }
            Err(failure) => {
                // Nothing to record when the backend itself is failing.
                if !matches!(failure.error, AuthError::Internal(_)) {
                    self.record_attempt(attempt(failure.user_id, failure.tenant_id, false))
                        .await;
                }
                debug!(%user_type, "login rejected: {}", failure.error);
                Err(failure.error)
            }
        }
    }

    async fn login_platform_admin(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AuthResponse, LoginFailure> {
        let admin = self
            .store(self.backends.credentials.find_platform_admin_by_username(username))
            .await
            .map_err(LoginFailure::anonymous)?;

        let user_id = admin.as_ref().map(|admin| admin.id);
        let fail = |error| LoginFailure::new(error, user_id, None);

        let matched = check_password(password, admin.as_ref().map(|a| a.password_hash.as_str()))
            .await
            .map_err(fail)?;
        let Some(admin) = admin.filter(|_| matched) else {
            return Err(fail(AuthError::InvalidCredentials));
        };
        if !admin.is_active {
            return Err(fail(AuthError::AccountDisabled));
        }

        let now = self.now();
        let access = AccessClaims::for_platform_admin(&admin, now, self.config.access_token_ttl());
        let response = self
            .issue(access, None, UserInfo::from(&admin), now)
            .await
            .map_err(fail)?;

        if let Err(err) = self
            .store(self.backends.credentials.touch_platform_admin_last_login(admin.id, now))
            .await
        {
            warn!(user_id = %admin.id, "failed to record last login: {err}");
        }

        Ok(response)
    }

    async fn login_tenant_user(
        &self,
        domain: &str,
        username: &str,
        password: &str,
    ) -> Result<AuthResponse, LoginFailure> {
        let tenant = if valid_domain(domain) {
            self.store(self.backends.tenants.find_tenant_by_domain(domain))
                .await
                .map_err(LoginFailure::anonymous)?
        } else {
            None
        };
        let Some(tenant) = tenant else {
            // Same work as a wrong password so unknown gyms are not observable.
            let _ = check_password(password, None).await;
            return Err(LoginFailure::anonymous(AuthError::InvalidCredentials));
        };

        let user = self
            .store(
                self.backends
                    .credentials
                    .find_tenant_user_by_username(&tenant, username),
            )
            .await
            .map_err(|error| LoginFailure::new(error, None, Some(tenant.id)))?;

        let user_id = user.as_ref().map(|user| user.id);
        let fail = |error| LoginFailure::new(error, user_id, Some(tenant.id));

        let matched = check_password(password, user.as_ref().map(|u| u.password_hash.as_str()))
            .await
            .map_err(fail)?;
        let Some(user) = user.filter(|_| matched) else {
            return Err(fail(AuthError::InvalidCredentials));
        };
        if !user.is_active || !tenant.is_active {
            return Err(fail(AuthError::AccountDisabled));
        }

        let now = self.now();
        if self.demo_expired(&user, now) {
            return Err(fail(AuthError::DemoExpired));
        }

        let access =
            AccessClaims::for_tenant_user(&user, &tenant, now, self.config.access_token_ttl());
        let response = self
            .issue(access, Some(tenant.id), UserInfo::tenant_user(&user, &tenant), now)
            .await
            .map_err(fail)?;

        if let Err(err) = self
            .store(
                self.backends
                    .credentials
                    .touch_tenant_user_last_login(&tenant, user.id, now),
            )
            .await
        {
            warn!(user_id = %user.id, gym_id = %tenant.id, "failed to record last login: {err}");
        }

        Ok(response)
    }

    fn demo_expired(&self, user: &TenantUser, now: DateTime<Utc>) -> bool {
        user.role == Role::Guest
            && user.verification_status == VerificationStatus::Demo
            && demo_window_elapsed(user.created_at, self.config.demo_window(), now)
    }

    /// Sign both tokens and persist the refresh record, replacing any earlier one.
    async fn issue(
        &self,
        access: AccessClaims,
        tenant_id: Option<Uuid>,
        user_info: UserInfo,
        now: DateTime<Utc>,
    ) -> Result<AuthResponse, AuthError> {
        let refresh = RefreshClaims::new(
            access.user_id,
            access.user_type,
            tenant_id,
            now,
            self.config.refresh_token_ttl(),
        );
        let access_token = self.codec.sign_access(&access).map_err(internal)?;
        let refresh_token = self.codec.sign_refresh(&refresh).map_err(internal)?;

        let record = RefreshTokenRecord {
            token: refresh_token.clone(),
            user_id: refresh.user_id,
            user_type: refresh.user_type,
            tenant_id: refresh.tenant_id,
            issued_at: refresh.issued_at(),
            expires_at: refresh.expires_at(),
        };
        self.store(self.backends.refresh_tokens.put(&record)).await?;

        Ok(AuthResponse {
            access_token,
            refresh_token,
            expires_at: access.expires_at(),
            user_info,
        })
    }

    async fn record_attempt(&self, attempt: LoginAttempt) {
        if let Err(err) = self
            .store(self.backends.login_attempts.record(&attempt))
            .await
        {
            warn!("failed to record login attempt: {err}");
        }
    }

    /// Check an access token without touching storage.
    #[must_use]
    pub fn validate_token(&self, token: &str) -> ValidateResponse {
        match self.codec.verify_access(token, self.now()) {
            Ok(claims) if claims.is_active => ValidateResponse::valid(claims),
            Ok(_) => {
                debug!("access token rejected: inactive principal");
                ValidateResponse::invalid()
            }
            Err(err) => {
                debug!("access token rejected: {err}");
                ValidateResponse::invalid()
            }
        }
    }

    /// Exchange a live refresh token for a new access token.
    ///
    /// The refresh token itself is returned unchanged.
    ///
    /// # Errors
    /// Returns [`AuthError::Unauthorized`] for any unusable token or principal,
    /// [`AuthError::Internal`] for backend failures.
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthResponse, AuthError> {
        let now = self.now();
        let claims = match self.codec.verify_refresh(refresh_token, now) {
            Ok(claims) => claims,
            Err(TokenError::Expired) => {
                self.store(self.backends.refresh_tokens.revoke(refresh_token))
                    .await?;
                return Err(AuthError::Unauthorized(INVALID_REFRESH_TOKEN));
            }
            Err(err) => {
                debug!("refresh token rejected: {err}");
                return Err(AuthError::Unauthorized(INVALID_REFRESH_TOKEN));
            }
        };

        let record = self
            .store(self.backends.refresh_tokens.lookup(refresh_token, now))
            .await?
            .ok_or(AuthError::Unauthorized(INVALID_REFRESH_TOKEN))?;
        if record.identity() != (claims.user_id, claims.user_type, claims.tenant_id) {
            warn!(user_id = %claims.user_id, "refresh record does not match token identity");
            return Err(AuthError::Unauthorized(INVALID_REFRESH_TOKEN));
        }

        let Some(principal) = self.reload_principal(&record).await? else {
            // The account is gone or disabled: drop every session it still has.
            let revoked = self
                .store(
                    self.backends
                        .refresh_tokens
                        .revoke_all(record.user_id, record.user_type),
                )
                .await?;
            info!(user_id = %record.user_id, revoked, "revoked sessions of inactive account");
            return Err(AuthError::Unauthorized(INVALID_REFRESH_TOKEN));
        };

        let ttl = self.config.access_token_ttl();
        let (access, user_info) = match &principal {
            Principal::Admin(admin) => (
                AccessClaims::for_platform_admin(admin, now, ttl),
                UserInfo::from(admin),
            ),
            Principal::Member(user, tenant) => {
                if self.demo_expired(user, now) {
                    return Err(AuthError::DemoExpired);
                }
                (
                    AccessClaims::for_tenant_user(user, tenant, now, ttl),
                    UserInfo::tenant_user(user, tenant),
                )
            }
        };

        let access_token = self.codec.sign_access(&access).map_err(internal)?;
        debug!(user_id = %access.user_id, "access token refreshed");

        Ok(AuthResponse {
            access_token,
            refresh_token: refresh_token.to_string(),
            expires_at: access.expires_at(),
            user_info,
        })
    }

    /// Current, active principal behind a refresh record.
    async fn reload_principal(
        &self,
        record: &RefreshTokenRecord,
    ) -> Result<Option<Principal>, AuthError> {
        match (record.user_type, record.tenant_id) {
            (UserType::PlatformAdmin, None) => {
                let admin = self
                    .store(self.backends.credentials.find_platform_admin_by_id(record.user_id))
                    .await?;
                Ok(admin.filter(|admin| admin.is_active).map(Principal::Admin))
            }
            (UserType::TenantUser, Some(tenant_id)) => {
                let tenant = self
                    .store(self.backends.tenants.find_tenant_by_id(tenant_id))
                    .await?;
                let Some(tenant) = tenant.filter(|tenant| tenant.is_active) else {
                    return Ok(None);
                };
                let user = self
                    .store(
                        self.backends
                            .credentials
                            .find_tenant_user_by_id(&tenant, record.user_id),
                    )
                    .await?;
                Ok(user
                    .filter(|user| user.is_active)
                    .map(|user| Principal::Member(user, tenant)))
            }
            _ => Ok(None),
        }
    }

    /// Revoke a refresh token by possession. Unknown tokens are fine.
    ///
    /// # Errors
    /// Returns [`AuthError::Internal`] when the store fails.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AuthError> {
        self.store(self.backends.refresh_tokens.revoke(refresh_token))
            .await
    }
}

fn internal(err: TokenError) -> AuthError {
    AuthError::Internal(err.to_string())
}

/// Verify on a blocking thread. With no stored hash the dummy hash is checked
/// and the result is always `false`.
async fn check_password(password: &str, hash: Option<&str>) -> Result<bool, AuthError> {
    let known = hash.is_some();
    let password = password.to_owned();
    let hash = hash.unwrap_or_else(|| dummy_hash()).to_owned();
    let matched = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|err| AuthError::Internal(format!("password check aborted: {err}")))?;
    Ok(known && matched)
}
