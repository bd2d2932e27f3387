//! Bearer-token binder for protected routes.
//!
//! The principal attached to the request comes only from the verified access
//! token. No client header other than `Authorization` is consulted.

use axum::{
    async_trait,
    extract::{Extension, FromRequestParts, Request},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use super::error::ApiError;
use crate::auth::{authz, AccessClaims, AuthService, Role, UserType};

const MISSING_TOKEN: &str = "Missing or malformed authorization header";
const INVALID_TOKEN: &str = "Invalid or expired token";

/// Principal bound to a request by [`require_bearer`].
#[derive(Clone, Debug)]
pub struct RequestContext {
    claims: AccessClaims,
}

impl RequestContext {
    #[must_use]
    pub fn new(claims: AccessClaims) -> Self {
        Self { claims }
    }

    #[must_use]
    pub fn claims(&self) -> &AccessClaims {
        &self.claims
    }

    #[must_use]
    pub fn user_type(&self) -> UserType {
        self.claims.user_type
    }

    #[must_use]
    pub fn role(&self) -> Option<Role> {
        self.claims.role
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized(MISSING_TOKEN))
    }
}

/// Token from `Authorization: Bearer <token>`.
///
/// The scheme must be exactly `Bearer` followed by one space; surrounding
/// whitespace on the token is trimmed and an empty token is rejected.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

/// Reject the request unless it carries a valid access token, then bind the
/// token's principal as a [`RequestContext`].
///
/// # Errors
/// Responds 401 for a missing, malformed, or invalid token.
pub async fn require_bearer(
    Extension(auth): Extension<Arc<AuthService>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(request.headers()).ok_or_else(|| ApiError::unauthorized(MISSING_TOKEN))?;

    let validation = auth.validate_token(token);
    let claims = match validation.claims {
        Some(claims) if validation.valid => claims,
        _ => return Err(ApiError::unauthorized(INVALID_TOKEN)),
    };

    debug!(user_id = %claims.user_id, user_type = %claims.user_type, "request bound");
    request.extensions_mut().insert(RequestContext::new(claims));

    Ok(next.run(request).await)
}

#[must_use]
pub fn user_id_from(ctx: &RequestContext) -> Uuid {
    ctx.claims.user_id
}

#[must_use]
pub fn tenant_id_from(ctx: &RequestContext) -> Option<Uuid> {
    ctx.claims.tenant_id
}

#[must_use]
pub fn is_platform_admin(ctx: &RequestContext) -> bool {
    authz::is_platform_admin(&ctx.claims)
}

#[must_use]
pub fn is_gym_admin(ctx: &RequestContext) -> bool {
    authz::is_gym_admin(&ctx.claims)
}

/// # Errors
/// Returns a 403 [`ApiError`] when the principal may not act on `requested`.
pub fn validate_tenant_access(ctx: &RequestContext, requested: Uuid) -> Result<(), ApiError> {
    if authz::has_tenant_access(&ctx.claims, requested) {
        Ok(())
    } else {
        Err(ApiError::forbidden("Access to this gym is not allowed")
            .with_detail(format!("user {} denied gym {requested}", ctx.claims.user_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenType;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    fn member(tenant_id: Uuid, role: Role) -> RequestContext {
        RequestContext::new(AccessClaims {
            user_id: Uuid::new_v4(),
            username: "ana".to_string(),
            user_type: UserType::TenantUser,
            is_active: true,
            tenant_id: Some(tenant_id),
            role: Some(role),
            verification_status: None,
            iat: 0,
            exp: 60,
            token_type: TokenType::Access,
        })
    }

    #[test]
    fn bearer_token_trims_trailing_whitespace() {
        assert_eq!(bearer_token(&headers("Bearer abc.def  ")), Some("abc.def"));
    }

    #[test]
    fn bearer_token_requires_scheme_and_space() {
        assert_eq!(bearer_token(&headers("Bearerabc")), None);
        assert_eq!(bearer_token(&headers("bearer abc")), None);
        assert_eq!(bearer_token(&headers("Basic abc")), None);
        assert_eq!(bearer_token(&headers("Bearer    ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn tenant_access_is_limited_to_own_gym() {
        let gym = Uuid::new_v4();
        let ctx = member(gym, Role::User);
        assert!(validate_tenant_access(&ctx, gym).is_ok());

        let err = validate_tenant_access(&ctx, Uuid::new_v4()).unwrap_err();
        assert_eq!(err.kind(), super::super::error::ErrorKind::Forbidden);
        assert_eq!(tenant_id_from(&ctx), Some(gym));
        assert!(!is_platform_admin(&ctx));
    }

    #[test]
    fn gym_admin_needs_admin_role() {
        let gym = Uuid::new_v4();
        assert!(is_gym_admin(&member(gym, Role::Admin)));
        assert!(!is_gym_admin(&member(gym, Role::Guest)));
    }
}
