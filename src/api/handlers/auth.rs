//! Login, refresh, logout, token validation, and the bound principal.
//!
//! Flow Overview:
//! 1) `POST /auth/login` picks the population from `X-Gym-Domain` (absent means
//!    platform admin) and returns an access/refresh pair.
//! 2) `POST /auth/refresh` trades a live refresh token for a new access token.
//! 3) `POST /auth/logout` revokes a refresh token by possession.
//! 4) `GET /auth/validate` reports whether a bearer token is usable.

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::HeaderMap,
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{extract_client_ip, gym_domain};
use crate::api::{
    error::{ApiError, ErrorEnvelope, MessageEnvelope},
    middleware::{bearer_token, tenant_id_from, user_id_from, RequestContext},
};
use crate::auth::{
    authz, AuthResponse, AuthService, LoginContext, Role, UserType, ValidateResponse,
    VerificationStatus,
};

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MeResponse {
    pub user_id: Uuid,
    pub username: String,
    pub user_type: UserType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_status: Option<VerificationStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limitation: Option<String>,
}

fn required_token(body: Result<Json<RefreshRequest>, JsonRejection>) -> Result<String, ApiError> {
    let Json(request) = body?;
    let token = request.refresh_token.trim();
    if token.is_empty() {
        return Err(ApiError::bad_request("refresh_token is required"));
    }
    Ok(token.to_string())
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    params(
        ("X-Gym-Domain" = Option<String>, Header, description = "Gym to log into; omit for platform admins")
    ),
    responses(
        (status = 200, description = "Authenticated", body = AuthResponse),
        (status = 400, description = "Malformed request", body = ErrorEnvelope),
        (status = 401, description = "Invalid credentials, disabled account, or expired demo", body = ErrorEnvelope),
        (status = 500, description = "Backend failure", body = ErrorEnvelope),
    ),
    tag = "auth"
)]
pub async fn login(
    headers: HeaderMap,
    Extension(auth): Extension<Arc<AuthService>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, ApiError> {
    let Json(request) = body?;
    if request.username.trim().is_empty() || request.password.is_empty() {
        return Err(ApiError::bad_request("username and password are required"));
    }

    let context = LoginContext {
        tenant_domain: gym_domain(&headers),
        client_ip: extract_client_ip(&headers),
    };
    let response = auth
        .login(request.username.trim(), &request.password, &context)
        .await?;
    Ok(Json(response))
}

#[utoipa::path(
    post,
    path = "/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New access token; the refresh token is unchanged", body = AuthResponse),
        (status = 400, description = "Malformed request", body = ErrorEnvelope),
        (status = 401, description = "Refresh token unusable", body = ErrorEnvelope),
        (status = 500, description = "Backend failure", body = ErrorEnvelope),
    ),
    tag = "auth"
)]
pub async fn refresh(
    Extension(auth): Extension<Arc<AuthService>>,
    body: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, ApiError> {
    let token = required_token(body)?;
    Ok(Json(auth.refresh(&token).await?))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Refresh token revoked", body = MessageEnvelope),
        (status = 400, description = "Malformed request", body = ErrorEnvelope),
        (status = 500, description = "Backend failure", body = ErrorEnvelope),
    ),
    tag = "auth"
)]
pub async fn logout(
    Extension(auth): Extension<Arc<AuthService>>,
    body: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<Json<MessageEnvelope>, ApiError> {
    let token = required_token(body)?;
    auth.logout(&token).await?;
    Ok(Json(MessageEnvelope::success("Logged out successfully")))
}

/// A missing or malformed header is a 401; a bad token is a 200 with
/// `valid: false`.
#[utoipa::path(
    get,
    path = "/auth/validate",
    responses(
        (status = 200, description = "Validation result", body = ValidateResponse),
        (status = 401, description = "Missing bearer token", body = ErrorEnvelope),
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn validate(
    headers: HeaderMap,
    Extension(auth): Extension<Arc<AuthService>>,
) -> Result<Json<ValidateResponse>, ApiError> {
    let token = bearer_token(&headers)
        .ok_or_else(|| ApiError::unauthorized("Missing or malformed authorization header"))?;
    Ok(Json(auth.validate_token(token)))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Principal bound from the access token", body = MeResponse),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorEnvelope),
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn me(ctx: RequestContext) -> Json<MeResponse> {
    let claims = ctx.claims();
    let limitation = match claims.user_type {
        UserType::TenantUser => {
            authz::demo_limitations_apply(claims.verification_status).map(str::to_string)
        }
        UserType::PlatformAdmin => None,
    };
    Json(MeResponse {
        user_id: user_id_from(&ctx),
        username: claims.username.clone(),
        user_type: ctx.user_type(),
        tenant_id: tenant_id_from(&ctx),
        role: ctx.role(),
        verification_status: claims.verification_status,
        limitation,
    })
}
