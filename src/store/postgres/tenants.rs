use async_trait::async_trait;
use sqlx::{postgres::PgRow, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::{is_unique_violation, PgStore};
use crate::store::{NewGym, StoreError, StoreResult, Tenant, TenantDirectory};

fn tenant_from_row(row: &PgRow) -> Tenant {
    Tenant {
        id: row.get("id"),
        name: row.get("name"),
        domain: row.get("domain"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl TenantDirectory for PgStore {
    async fn find_tenant_by_domain(&self, domain: &str) -> StoreResult<Option<Tenant>> {
        let query = "SELECT id, name, domain, is_active, created_at FROM gyms WHERE domain = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(domain)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;
        Ok(row.as_ref().map(tenant_from_row))
    }

    async fn find_tenant_by_id(&self, id: Uuid) -> StoreResult<Option<Tenant>> {
        let query = "SELECT id, name, domain, is_active, created_at FROM gyms WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;
        Ok(row.as_ref().map(tenant_from_row))
    }

    async fn create_tenant(&self, gym: &NewGym) -> StoreResult<Tenant> {
        let query = r"
            INSERT INTO gyms (name, domain)
            VALUES ($1, $2)
            RETURNING id, name, domain, is_active, created_at
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        match sqlx::query(query)
            .bind(&gym.name)
            .bind(&gym.domain)
            .fetch_one(&self.pool)
            .instrument(span)
            .await
        {
            Ok(row) => Ok(tenant_from_row(&row)),
            Err(err) if is_unique_violation(&err) => Err(StoreError::Conflict(format!(
                "gym domain {} is taken",
                gym.domain
            ))),
            Err(err) => Err(err.into()),
        }
    }

    async fn delete_tenant(&self, id: Uuid) -> StoreResult<()> {
        let query = "DELETE FROM gyms WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(span)
            .await?;
        Ok(())
    }
}
