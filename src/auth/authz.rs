//! Authorization predicates over verified access claims.
//!
//! They never error. A missing field, an unknown role, or an unknown
//! verification status always answers "no"; callers turn a `false` into a 403.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::claims::AccessClaims;
use super::identity::{Role, UserType, VerificationStatus};

#[must_use]
pub fn is_platform_admin(claims: &AccessClaims) -> bool {
    claims.user_type == UserType::PlatformAdmin
}

/// A tenant user always carries a tenant id; a claim without one is not trusted.
#[must_use]
pub fn is_tenant_user(claims: &AccessClaims) -> bool {
    claims.user_type == UserType::TenantUser && claims.tenant_id.is_some()
}

/// Platform admins, or tenant users holding the `admin` role.
#[must_use]
pub fn is_gym_admin(claims: &AccessClaims) -> bool {
    is_platform_admin(claims) || (is_tenant_user(claims) && claims.role == Some(Role::Admin))
}

/// Platform admins reach every gym; tenant users only their own.
#[must_use]
pub fn has_tenant_access(claims: &AccessClaims, requested: Uuid) -> bool {
    is_platform_admin(claims) || (is_tenant_user(claims) && claims.tenant_id == Some(requested))
}

/// Compare two roles on `admin > user > guest`. `Unknown` on either side is `false`.
#[must_use]
pub fn role_at_least(actual: Role, required: Role) -> bool {
    match (actual.rank(), required.rank()) {
        (Some(actual), Some(required)) => actual >= required,
        _ => false,
    }
}

/// Role check for a principal. Platform admins hold no tenant role and pass.
#[must_use]
pub fn has_role_at_least(claims: &AccessClaims, required: Role) -> bool {
    if is_platform_admin(claims) {
        return required.rank().is_some();
    }
    is_tenant_user(claims) && claims.role.is_some_and(|role| role_at_least(role, required))
}

/// Why an account's access is limited, or `None` when it is not.
#[must_use]
pub fn demo_limitations_apply(status: Option<VerificationStatus>) -> Option<&'static str> {
    match status {
        Some(VerificationStatus::Verified) => None,
        Some(VerificationStatus::Demo) => {
            Some("demo account: limited access until the demo period ends")
        }
        Some(VerificationStatus::Unverified) => Some("account is not verified yet"),
        Some(VerificationStatus::Unknown) | None => Some("verification status is unknown"),
    }
}

/// Whether the demo period that started at `created_at` is over at `now`.
#[must_use]
pub fn demo_window_elapsed(created_at: DateTime<Utc>, window: Duration, now: DateTime<Utc>) -> bool {
    now >= created_at + window
}
