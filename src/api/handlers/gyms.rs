//! Gym onboarding for platform admins.
//!
//! Flow Overview:
//! 1) Require a platform-admin principal.
//! 2) Validate the domain before anything touches storage.
//! 3) Insert the gym row, then provision its schema.
//! 4) If provisioning fails, remove the row so the domain can be retried.

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::{
    error::{ApiError, ErrorEnvelope},
    middleware::{is_platform_admin, user_id_from, RequestContext},
};
use crate::auth::{with_deadline, AuthService};
use crate::store::{Backends, NewGym, Tenant};
use crate::tenant::valid_domain;

const MAX_NAME_LEN: usize = 255;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateGymRequest {
    pub name: String,
    /// DNS-safe label; also the gym's schema name.
    pub domain: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GymResponse {
    pub id: Uuid,
    pub name: String,
    pub domain: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Tenant> for GymResponse {
    fn from(tenant: Tenant) -> Self {
        Self {
            id: tenant.id,
            name: tenant.name,
            domain: tenant.domain,
            is_active: tenant.is_active,
            created_at: tenant.created_at,
        }
    }
}

#[utoipa::path(
    post,
    path = "/admin/gyms",
    request_body = CreateGymRequest,
    responses(
        (status = 201, description = "Gym created and provisioned", body = GymResponse),
        (status = 400, description = "Invalid name or domain", body = ErrorEnvelope),
        (status = 401, description = "Missing or invalid bearer token", body = ErrorEnvelope),
        (status = 403, description = "Caller is not a platform admin", body = ErrorEnvelope),
        (status = 409, description = "Domain already taken", body = ErrorEnvelope),
        (status = 500, description = "Provisioning failed", body = ErrorEnvelope),
    ),
    security(("bearer" = [])),
    tag = "gyms"
)]
pub async fn create_gym(
    ctx: RequestContext,
    Extension(auth): Extension<Arc<AuthService>>,
    Extension(backends): Extension<Backends>,
    body: Result<Json<CreateGymRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<GymResponse>), ApiError> {
    if !is_platform_admin(&ctx) {
        return Err(ApiError::forbidden("Platform admin access required")
            .with_detail(format!("user {} is not a platform admin", user_id_from(&ctx))));
    }

    let Json(request) = body?;
    let name = request.name.trim();
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(ApiError::bad_request("Gym name is required"));
    }
    let domain = request.domain.trim();
    if !valid_domain(domain) {
        return Err(ApiError::bad_request("Invalid gym domain")
            .with_detail(format!("rejected domain {domain:?}")));
    }

    let deadline = auth.config().store_timeout();
    let gym = NewGym {
        name: name.to_string(),
        domain: domain.to_string(),
    };
    let tenant = with_deadline(deadline, backends.tenants.create_tenant(&gym)).await?;

    if let Err(err) = backends.provisioner.provision(&tenant).await {
        error!(gym_id = %tenant.id, domain = %tenant.domain, "provisioning failed: {err}");
        if let Err(cleanup) = with_deadline(deadline, backends.tenants.delete_tenant(tenant.id)).await {
            error!(gym_id = %tenant.id, "failed to remove unprovisioned gym: {cleanup}");
        }
        return Err(err.into());
    }

    info!(gym_id = %tenant.id, domain = %tenant.domain, "gym created");
    Ok((StatusCode::CREATED, Json(GymResponse::from(tenant))))
}
