use crate::store::StoreError;

/// Failures of the authentication flows.
///
/// `InvalidCredentials` covers unknown gym, unknown user, and wrong password
/// alike. `AccountDisabled` is only reported after the password checked out.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("account disabled")]
    AccountDisabled,
    #[error("demo period expired")]
    DemoExpired,
    #[error("{0}")]
    Unauthorized(&'static str),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        Self::Internal(err.to_string())
    }
}
