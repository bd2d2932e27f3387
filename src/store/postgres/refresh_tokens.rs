use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use tracing::Instrument;
use uuid::Uuid;

use super::PgStore;
use crate::auth::identity::UserType;
use crate::store::{RefreshTokenRecord, RefreshTokenStore, StoreError, StoreResult};

#[async_trait]
impl RefreshTokenStore for PgStore {
    async fn put(&self, record: &RefreshTokenRecord) -> StoreResult<()> {
        // The identity constraint treats a NULL gym as a value, so platform
        // admins also keep a single row.
        let query = r"
            INSERT INTO refresh_tokens
                (token, user_id, user_type, gym_id, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT ON CONSTRAINT refresh_tokens_identity_key DO UPDATE
            SET token = EXCLUDED.token,
                created_at = EXCLUDED.created_at,
                expires_at = EXCLUDED.expires_at
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(&record.token)
            .bind(record.user_id)
            .bind(record.user_type.as_str())
            .bind(record.tenant_id)
            .bind(record.issued_at)
            .bind(record.expires_at)
            .execute(&self.pool)
            .instrument(span)
            .await?;
        Ok(())
    }

    async fn lookup(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<RefreshTokenRecord>> {
        let query = r"
            SELECT token, user_id, user_type, gym_id, created_at, expires_at
            FROM refresh_tokens
            WHERE token = $1 AND expires_at > $2
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(token)
            .bind(now)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let user_type: String = row.get("user_type");
        let user_type = UserType::parse(&user_type).ok_or_else(|| {
            StoreError::BackendUnavailable(format!("unexpected user_type {user_type}"))
        })?;

        Ok(Some(RefreshTokenRecord {
            token: row.get("token"),
            user_id: row.get("user_id"),
            user_type,
            tenant_id: row.get("gym_id"),
            issued_at: row.get("created_at"),
            expires_at: row.get("expires_at"),
        }))
    }

    async fn revoke(&self, token: &str) -> StoreResult<()> {
        let query = "DELETE FROM refresh_tokens WHERE token = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(token)
            .execute(&self.pool)
            .instrument(span)
            .await?;
        Ok(())
    }

    async fn revoke_all(&self, user_id: Uuid, user_type: UserType) -> StoreResult<u64> {
        let query = "DELETE FROM refresh_tokens WHERE user_id = $1 AND user_type = $2";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(user_id)
            .bind(user_type.as_str())
            .execute(&self.pool)
            .instrument(span)
            .await?;
        Ok(result.rows_affected())
    }

    async fn sweep(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        let query = "DELETE FROM refresh_tokens WHERE expires_at <= $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(now)
            .execute(&self.pool)
            .instrument(span)
            .await?;
        Ok(result.rows_affected())
    }
}
