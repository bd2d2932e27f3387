//! Results of the authentication flows, serialized as-is by the HTTP layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::claims::AccessClaims;
use super::identity::{Role, UserType, VerificationStatus};
use crate::store::{PlatformAdmin, Tenant, TenantUser};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UserInfo {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub user_type: UserType,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_status: Option<VerificationStatus>,
}

impl From<&PlatformAdmin> for UserInfo {
    fn from(admin: &PlatformAdmin) -> Self {
        Self {
            id: admin.id,
            username: admin.username.clone(),
            email: admin.email.clone(),
            user_type: UserType::PlatformAdmin,
            is_active: admin.is_active,
            tenant_id: None,
            tenant_domain: None,
            role: None,
            verification_status: None,
        }
    }
}

impl UserInfo {
    #[must_use]
    pub fn tenant_user(user: &TenantUser, tenant: &Tenant) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            user_type: UserType::TenantUser,
            is_active: user.is_active,
            tenant_id: Some(tenant.id),
            tenant_domain: Some(tenant.domain.clone()),
            role: Some(user.role),
            verification_status: Some(user.verification_status),
        }
    }
}

/// Body returned by login and refresh.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Expiry of `access_token`.
    pub expires_at: DateTime<Utc>,
    pub user_info: UserInfo,
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ValidateResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claims: Option<AccessClaims>,
    pub message: String,
}

impl ValidateResponse {
    #[must_use]
    pub fn valid(claims: AccessClaims) -> Self {
        Self {
            valid: true,
            claims: Some(claims),
            message: "Token is valid".to_string(),
        }
    }

    #[must_use]
    pub fn invalid() -> Self {
        Self {
            valid: false,
            claims: None,
            message: "Invalid token".to_string(),
        }
    }
}

/// What a login needs besides the credentials themselves.
#[derive(Clone, Debug, Default)]
pub struct LoginContext {
    /// Gym domain; `None` selects the platform-admin population.
    pub tenant_domain: Option<String>,
    pub client_ip: Option<String>,
}
