//! Materializes a gym's schema and the tables the gym's data lives in.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::Instrument;

use super::domain::{quote_ident, valid_domain};
use crate::store::postgres::split_sql_statements;
use crate::store::Tenant;

const TENANT_SCHEMA_SQL: &str = include_str!("../../sql/tenant.sql");

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("invalid gym domain")]
    InvalidDomain,
    #[error("schema {0} already exists")]
    NamespaceTaken(String),
    #[error("provisioning failed: {0}")]
    Failed(String),
}

impl From<sqlx::Error> for ProvisionError {
    fn from(err: sqlx::Error) -> Self {
        Self::Failed(err.to_string())
    }
}

#[async_trait]
pub trait TenantProvisioner: Send + Sync {
    /// Create the schema for `tenant` and every per-gym table.
    ///
    /// Succeeds again for the gym that owns the schema; any other gym gets
    /// [`ProvisionError::NamespaceTaken`].
    async fn provision(&self, tenant: &Tenant) -> Result<(), ProvisionError>;
}

/// Per-gym DDL with the schema name substituted, one statement per entry.
///
/// # Errors
/// Returns [`ProvisionError::InvalidDomain`] if the domain is not DNS-safe.
pub fn render_tenant_schema(domain: &str) -> Result<Vec<String>, ProvisionError> {
    if !valid_domain(domain) {
        return Err(ProvisionError::InvalidDomain);
    }
    let schema = quote_ident(domain);
    Ok(split_sql_statements(&TENANT_SCHEMA_SQL.replace("{schema}", &schema)))
}

/// Marks the schema as belonging to `tenant`. A UUID needs no literal escaping.
fn ownership_statement(tenant: &Tenant) -> String {
    format!(
        "COMMENT ON SCHEMA {} IS '{}'",
        quote_ident(&tenant.domain),
        tenant.id
    )
}

fn owned_by(owner: Option<&str>, tenant: &Tenant) -> bool {
    owner.is_some_and(|owner| owner == tenant.id.to_string())
}

#[derive(Clone, Debug)]
pub struct PgProvisioner {
    pool: PgPool,
}

impl PgProvisioner {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantProvisioner for PgProvisioner {
    async fn provision(&self, tenant: &Tenant) -> Result<(), ProvisionError> {
        let statements = render_tenant_schema(&tenant.domain)?;

        // DDL is transactional in Postgres: a failure rolls back the whole schema.
        let mut tx = self.pool.begin().await?;

        // Serialize concurrent provisioning of the same domain.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(&tenant.domain)
            .execute(&mut *tx)
            .await?;

        // The owning gym id lives on the schema itself, so a namespace left
        // behind by a removed gym is never reused by a new row.
        let query = r"
            SELECT obj_description(oid, 'pg_namespace') AS owner
            FROM pg_namespace
            WHERE nspname = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let existing = sqlx::query(query)
            .bind(&tenant.domain)
            .fetch_optional(&mut *tx)
            .instrument(span)
            .await?;
        if let Some(row) = existing {
            let owner: Option<String> = row.try_get("owner")?;
            if !owned_by(owner.as_deref(), tenant) {
                let _ = tx.rollback().await;
                return Err(ProvisionError::NamespaceTaken(tenant.domain.clone()));
            }
        }

        for (index, statement) in statements.iter().enumerate() {
            let span = tracing::info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "DDL",
                db.statement = statement.as_str()
            );
            if let Err(err) = sqlx::query(statement)
                .execute(&mut *tx)
                .instrument(span)
                .await
            {
                let _ = tx.rollback().await;
                return Err(ProvisionError::Failed(format!(
                    "statement {} failed: {err}",
                    index + 1
                )));
            }
        }

        let statement = ownership_statement(tenant);
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "COMMENT",
            db.statement = statement.as_str()
        );
        sqlx::query(&statement)
            .execute(&mut *tx)
            .instrument(span)
            .await?;

        tx.commit().await?;

        tracing::info!(gym_id = %tenant.id, domain = %tenant.domain, "provisioned gym schema");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn rendered_schema_quotes_every_reference() -> Result<()> {
        let statements = render_tenant_schema("iron-temple")?;
        assert!(statements[0].contains("CREATE SCHEMA IF NOT EXISTS \"iron-temple\";"));
        assert!(statements.iter().all(|stmt| !stmt.contains("{schema}")));
        assert!(statements
            .iter()
            .any(|stmt| stmt.contains("\"iron-temple\".users")));
        Ok(())
    }

    #[test]
    fn rendered_schema_covers_collaborator_tables() -> Result<()> {
        let ddl = render_tenant_schema("gym42")?.join("\n");
        for table in [
            "users",
            "invitations",
            "muscular_groups",
            "exercises",
            "exercise_muscular_groups",
            "workouts",
            "workout_exercises",
            "custom_templates",
            "custom_template_exercises",
        ] {
            assert!(
                ddl.contains(&format!("\"gym42\".{table} (")),
                "missing table {table}"
            );
        }
        Ok(())
    }

    #[test]
    fn only_the_recorded_gym_owns_a_schema() {
        let tenant = Tenant {
            id: uuid::Uuid::new_v4(),
            name: "Iron Temple".to_string(),
            domain: "iron-temple".to_string(),
            is_active: true,
            created_at: chrono::Utc::now(),
        };
        assert!(owned_by(Some(&tenant.id.to_string()), &tenant));
        assert!(!owned_by(None, &tenant));
        assert!(!owned_by(Some(&uuid::Uuid::new_v4().to_string()), &tenant));
        assert_eq!(
            ownership_statement(&tenant),
            format!("COMMENT ON SCHEMA \"iron-temple\" IS '{}'", tenant.id)
        );
    }

    #[test]
    fn reserved_schemas_never_render() {
        for domain in ["public", "information_schema", "pg-toast"] {
            assert!(matches!(
                render_tenant_schema(domain),
                Err(ProvisionError::InvalidDomain)
            ));
        }
    }

    #[test]
    fn invalid_domain_never_renders() {
        assert!(matches!(
            render_tenant_schema("x\"; DROP SCHEMA public; --"),
            Err(ProvisionError::InvalidDomain)
        ));
        assert!(matches!(
            render_tenant_schema(""),
            Err(ProvisionError::InvalidDomain)
        ));
    }
}
