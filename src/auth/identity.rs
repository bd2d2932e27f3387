//! Identity axes shared by tokens, storage, and authorization.
//!
//! Role and verification status are independent: a `guest` may be `verified`
//! and an `admin` may still be `unverified`. Values that arrive from storage or
//! from a token but are not recognized collapse into `Unknown`, which every
//! predicate treats as a denial.

use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Which identity store a principal comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    PlatformAdmin,
    TenantUser,
}

impl UserType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PlatformAdmin => "platform_admin",
            Self::TenantUser => "tenant_user",
        }
    }

    /// Parse the storage representation; anything else is `None`.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "platform_admin" => Some(Self::PlatformAdmin),
            "tenant_user" => Some(Self::TenantUser),
            _ => None,
        }
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tenant-scoped role, totally ordered `admin > user > guest`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    User,
    Guest,
    #[serde(other)]
    Unknown,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
            Self::Guest => "guest",
            Self::Unknown => "unknown",
        }
    }

    /// Position in the hierarchy; `None` for roles outside it.
    #[must_use]
    pub const fn rank(self) -> Option<u8> {
        match self {
            Self::Admin => Some(3),
            Self::User => Some(2),
            Self::Guest => Some(1),
            Self::Unknown => None,
        }
    }
}

impl From<&str> for Role {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Self::Admin,
            "user" => Self::User,
            "guest" => Self::Guest,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Account verification axis for tenant users.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Verified,
    Unverified,
    Demo,
    #[serde(other)]
    Unknown,
}

impl VerificationStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Verified => "verified",
            Self::Unverified => "unverified",
            Self::Demo => "demo",
            Self::Unknown => "unknown",
        }
    }
}

impl From<&str> for VerificationStatus {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "verified" => Self::Verified,
            "unverified" => Self::Unverified,
            "demo" => Self::Demo,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
