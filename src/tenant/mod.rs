//! Per-gym namespaces.
//!
//! Every gym gets a Postgres schema named after its domain. The domain is
//! checked against [`DOMAIN_PATTERN`] before any DDL is built from it, and the
//! schema name is always emitted quoted.

mod domain;
mod provisioner;

pub use domain::{quote_ident, valid_domain, DOMAIN_PATTERN};
pub use provisioner::{render_tenant_schema, PgProvisioner, ProvisionError, TenantProvisioner};
