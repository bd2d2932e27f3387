//! Authentication and authorization.

pub mod authz;
pub mod claims;
pub mod clock;
mod config;
mod error;
pub mod identity;
pub mod password;
mod service;
pub mod token;
mod types;

pub use claims::{AccessClaims, RefreshClaims, TokenType};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AuthConfig, MAX_ACCESS_TOKEN_TTL_SECONDS, MAX_LIFETIME_SECONDS};
pub use error::AuthError;
pub use identity::{Role, UserType, VerificationStatus};
pub use service::{with_deadline, AuthService};
pub use token::{TokenCodec, TokenError};
pub use types::{AuthResponse, LoginContext, UserInfo, ValidateResponse};
