use async_trait::async_trait;
use tracing::Instrument;

use super::PgStore;
use crate::store::{LoginAttempt, LoginAttemptLog, StoreResult};

#[async_trait]
impl LoginAttemptLog for PgStore {
    async fn record(&self, attempt: &LoginAttempt) -> StoreResult<()> {
        let query = r"
            INSERT INTO login_attempts
                (user_id, user_type, gym_id, success, client_ip, attempted_at)
            VALUES ($1, $2, $3, $4, $5, $6)
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(attempt.user_id)
            .bind(attempt.user_type.as_str())
            .bind(attempt.tenant_id)
            .bind(attempt.success)
            .bind(attempt.client_ip.as_deref())
            .bind(attempt.attempted_at)
            .execute(&self.pool)
            .instrument(span)
            .await?;
        Ok(())
    }
}
