//! Token payloads.
//!
//! Timestamps are unix seconds. `token_type` keeps an access token from being
//! accepted where a refresh token is expected and vice versa.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::identity::{Role, UserType, VerificationStatus};
use crate::store::{PlatformAdmin, Tenant, TenantUser};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Claims carried by an access token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AccessClaims {
    pub user_id: Uuid,
    pub username: String,
    pub user_type: UserType,
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_status: Option<VerificationStatus>,
    pub iat: i64,
    pub exp: i64,
    pub token_type: TokenType,
}

impl AccessClaims {
    #[must_use]
    pub fn for_platform_admin(admin: &PlatformAdmin, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            user_id: admin.id,
            username: admin.username.clone(),
            user_type: UserType::PlatformAdmin,
            is_active: admin.is_active,
            tenant_id: None,
            role: None,
            verification_status: None,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            token_type: TokenType::Access,
        }
    }

    #[must_use]
    pub fn for_tenant_user(
        user: &TenantUser,
        tenant: &Tenant,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            user_type: UserType::TenantUser,
            is_active: user.is_active,
            tenant_id: Some(tenant.id),
            role: Some(user.role),
            verification_status: Some(user.verification_status),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            token_type: TokenType::Access,
        }
    }

    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        from_unix(self.exp)
    }
}

/// Claims carried by a refresh token. `jti` makes every issued token distinct.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub user_id: Uuid,
    pub user_type: UserType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<Uuid>,
    pub iat: i64,
    pub exp: i64,
    pub jti: Uuid,
    pub token_type: TokenType,
}

impl RefreshClaims {
    #[must_use]
    pub fn new(
        user_id: Uuid,
        user_type: UserType,
        tenant_id: Option<Uuid>,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            user_id,
            user_type,
            tenant_id,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            jti: Uuid::new_v4(),
            token_type: TokenType::Refresh,
        }
    }

    #[must_use]
    pub fn issued_at(&self) -> DateTime<Utc> {
        from_unix(self.iat)
    }

    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        from_unix(self.exp)
    }
}

fn from_unix(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(seconds, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
