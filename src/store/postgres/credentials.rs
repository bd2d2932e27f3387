use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::{tenant_schema, PgStore};
use crate::auth::identity::{Role, VerificationStatus};
use crate::store::{CredentialStore, PlatformAdmin, StoreResult, Tenant, TenantUser};

const ADMIN_COLUMNS: &str =
    "id, username, email, password_hash, is_active, last_login_at, created_at";
const TENANT_USER_COLUMNS: &str = "id, username, email, password_hash, role, \
     verification_status, is_active, last_login_at, created_at";

fn admin_from_row(row: &PgRow) -> PlatformAdmin {
    PlatformAdmin {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        is_active: row.get("is_active"),
        last_login_at: row.get("last_login_at"),
        created_at: row.get("created_at"),
    }
}

fn tenant_user_from_row(tenant: &Tenant, row: &PgRow) -> TenantUser {
    let role: String = row.get("role");
    let verification_status: String = row.get("verification_status");
    TenantUser {
        id: row.get("id"),
        tenant_id: tenant.id,
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        role: Role::from(role.as_str()),
        verification_status: VerificationStatus::from(verification_status.as_str()),
        is_active: row.get("is_active"),
        last_login_at: row.get("last_login_at"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl CredentialStore for PgStore {
    async fn find_platform_admin_by_username(
        &self,
        username: &str,
    ) -> StoreResult<Option<PlatformAdmin>> {
        let query = format!("SELECT {ADMIN_COLUMNS} FROM platform_admins WHERE username = $1");
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(username)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;
        Ok(row.as_ref().map(admin_from_row))
    }

    async fn find_platform_admin_by_id(&self, id: Uuid) -> StoreResult<Option<PlatformAdmin>> {
        let query = format!("SELECT {ADMIN_COLUMNS} FROM platform_admins WHERE id = $1");
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;
        Ok(row.as_ref().map(admin_from_row))
    }

    async fn find_tenant_user_by_username(
        &self,
        tenant: &Tenant,
        username: &str,
    ) -> StoreResult<Option<TenantUser>> {
        let schema = tenant_schema(tenant)?;
        let query = format!("SELECT {TENANT_USER_COLUMNS} FROM {schema}.users WHERE username = $1");
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(username)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;
        Ok(row.map(|row| tenant_user_from_row(tenant, &row)))
    }

    async fn find_tenant_user_by_id(
        &self,
        tenant: &Tenant,
        id: Uuid,
    ) -> StoreResult<Option<TenantUser>> {
        let schema = tenant_schema(tenant)?;
        let query = format!("SELECT {TENANT_USER_COLUMNS} FROM {schema}.users WHERE id = $1");
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;
        Ok(row.map(|row| tenant_user_from_row(tenant, &row)))
    }

    async fn touch_platform_admin_last_login(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let query = "UPDATE platform_admins SET last_login_at = $2, updated_at = NOW() WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .instrument(span)
            .await?;
        Ok(())
    }

    async fn touch_tenant_user_last_login(
        &self,
        tenant: &Tenant,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        let schema = tenant_schema(tenant)?;
        let query = format!(
            "UPDATE {schema}.users SET last_login_at = $2, updated_at = NOW() WHERE id = $1"
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query.as_str()
        );
        sqlx::query(&query)
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .instrument(span)
            .await?;
        Ok(())
    }
}
