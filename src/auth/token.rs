//! HS256 token codec.
//!
//! Only HS256 is accepted: a token whose header names any other algorithm is
//! rejected before its payload is looked at. Expiry is checked here against an
//! explicit `now` with no leeway, so a token is dead at exactly `exp`.

use chrono::{DateTime, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt;

use super::claims::{AccessClaims, RefreshClaims, TokenType};

/// Tolerated clock drift for `iat` in the future.
pub const MAX_ISSUED_AT_SKEW_SECONDS: i64 = 30;

const ALGORITHM: Algorithm = Algorithm::HS256;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("invalid token signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("malformed token: {0}")]
    Malformed(String),
    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => Self::InvalidSignature,
            ErrorKind::ExpiredSignature => Self::Expired,
            _ => Self::Malformed(err.to_string()),
        }
    }
}

/// Common shape of both claim sets for time and type checks.
trait TimedClaims {
    fn iat(&self) -> i64;
    fn exp(&self) -> i64;
    fn token_type(&self) -> TokenType;
}

impl TimedClaims for AccessClaims {
    fn iat(&self) -> i64 {
        self.iat
    }

    fn exp(&self) -> i64 {
        self.exp
    }

    fn token_type(&self) -> TokenType {
        self.token_type
    }
}

impl TimedClaims for RefreshClaims {
    fn iat(&self) -> i64 {
        self.iat
    }

    fn exp(&self) -> i64 {
        self.exp
    }

    fn token_type(&self) -> TokenType {
        self.token_type
    }
}

pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &ALGORITHM)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    #[must_use]
    pub fn new(secret: &SecretString) -> Self {
        let key = secret.expose_secret().as_bytes();

        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = 0;
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding: EncodingKey::from_secret(key),
            decoding: DecodingKey::from_secret(key),
            validation,
        }
    }

    /// # Errors
    /// Returns [`TokenError::Signing`] if the claims cannot be encoded.
    pub fn sign_access(&self, claims: &AccessClaims) -> Result<String, TokenError> {
        self.sign(claims)
    }

    /// # Errors
    /// Returns [`TokenError::Signing`] if the claims cannot be encoded.
    pub fn sign_refresh(&self, claims: &RefreshClaims) -> Result<String, TokenError> {
        self.sign(claims)
    }

    /// Verify an access token at `now`.
    ///
    /// # Errors
    /// Returns the [`TokenError`] describing why the token is unusable.
    pub fn verify_access(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<AccessClaims, TokenError> {
        self.verify(token, now, TokenType::Access)
    }

    /// Verify a refresh token at `now`.
    ///
    /// # Errors
    /// Returns the [`TokenError`] describing why the token is unusable.
    pub fn verify_refresh(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<RefreshClaims, TokenError> {
        self.verify(token, now, TokenType::Refresh)
    }

    fn sign<T: Serialize>(&self, claims: &T) -> Result<String, TokenError> {
        encode(&Header::new(ALGORITHM), claims, &self.encoding)
            .map_err(|err| TokenError::Signing(err.to_string()))
    }

    fn verify<T>(
        &self,
        token: &str,
        now: DateTime<Utc>,
        expected: TokenType,
    ) -> Result<T, TokenError>
    where
        T: DeserializeOwned + TimedClaims,
    {
        let claims = decode::<T>(token, &self.decoding, &self.validation)?.claims;

        if claims.token_type() != expected {
            return Err(TokenError::Malformed(format!(
                "expected {expected:?} token, got {:?}",
                claims.token_type()
            )));
        }
        if claims.exp() <= claims.iat() {
            return Err(TokenError::Malformed("exp is not after iat".to_string()));
        }

        let now = now.timestamp();
        if claims.iat() > now + MAX_ISSUED_AT_SKEW_SECONDS {
            return Err(TokenError::Malformed("iat is in the future".to_string()));
        }
        if now >= claims.exp() {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}
