//! Records owned by the storage ports.

use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

use crate::auth::identity::{Role, UserType, VerificationStatus};

/// Global administrator, not bound to any gym.
#[derive(Clone)]
pub struct PlatformAdmin {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl fmt::Debug for PlatformAdmin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformAdmin")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password_hash", &"[REDACTED]")
            .field("is_active", &self.is_active)
            .field("last_login_at", &self.last_login_at)
            .finish_non_exhaustive()
    }
}

/// Gym member stored inside the gym's own schema.
#[derive(Clone)]
pub struct TenantUser {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub verification_status: VerificationStatus,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl fmt::Debug for TenantUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantUser")
            .field("id", &self.id)
            .field("tenant_id", &self.tenant_id)
            .field("username", &self.username)
            .field("role", &self.role)
            .field("verification_status", &self.verification_status)
            .field("password_hash", &"[REDACTED]")
            .field("is_active", &self.is_active)
            .finish_non_exhaustive()
    }
}

/// A gym. Its `domain` doubles as the schema name of its data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub domain: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a gym row.
#[derive(Clone, Debug)]
pub struct NewGym {
    pub name: String,
    pub domain: String,
}

/// A live refresh token; at most one per `(user_id, user_type, tenant_id)`.
#[derive(Clone, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub token: String,
    pub user_id: Uuid,
    pub user_type: UserType,
    pub tenant_id: Option<Uuid>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    #[must_use]
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }

    /// Identity key the single-live-token rule is enforced on.
    #[must_use]
    pub fn identity(&self) -> (Uuid, UserType, Option<Uuid>) {
        (self.user_id, self.user_type, self.tenant_id)
    }
}

impl fmt::Debug for RefreshTokenRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshTokenRecord")
            .field("token", &"[REDACTED]")
            .field("user_id", &self.user_id)
            .field("user_type", &self.user_type)
            .field("tenant_id", &self.tenant_id)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Append-only audit row written for every login attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoginAttempt {
    pub user_id: Option<Uuid>,
    pub user_type: UserType,
    pub tenant_id: Option<Uuid>,
    pub success: bool,
    pub client_ip: Option<String>,
    pub attempted_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn admin() -> PlatformAdmin {
        PlatformAdmin {
            id: Uuid::new_v4(),
            username: "root".to_string(),
            email: "root@spotter.fit".to_string(),
            password_hash: "$argon2id$v=19$secret".to_string(),
            is_active: true,
            last_login_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn debug_output_hides_password_hash() {
        let rendered = format!("{:?}", admin());
        assert!(rendered.contains("root"));
        assert!(!rendered.contains("argon2id"));
    }

    #[test]
    fn refresh_record_is_dead_at_expiry() {
        let now = Utc::now();
        let record = RefreshTokenRecord {
            token: "opaque".to_string(),
            user_id: Uuid::new_v4(),
            user_type: UserType::PlatformAdmin,
            tenant_id: None,
            issued_at: now - Duration::days(7),
            expires_at: now,
        };
        assert!(!record.is_live(now));
        assert!(record.is_live(now - Duration::seconds(1)));
        assert!(!format!("{record:?}").contains("opaque"));
    }
}
