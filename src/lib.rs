//! # Spotter (authentication and tenant isolation core)
//!
//! `spotter` is the identity core of a multi-tenant gym management back-end.
//! Two populations share one service:
//!
//! - **Platform admins** live in a global table and are not bound to any gym.
//! - **Tenant users** live inside the gym's own database schema and carry a
//!   role (`admin`, `user`, `guest`) plus a verification status
//!   (`verified`, `unverified`, `demo`).
//!
//! ## Tokens
//!
//! Login mints a short-lived HS256 access token (claim-rich, never checked
//! against storage) and a long-lived refresh token whose record lives in
//! `refresh_tokens`. There is at most one live refresh token per identity, so a
//! new login evicts the previous one. Refresh re-reads the user so role and
//! activation changes apply on the next refresh.
//!
//! ## Tenant isolation
//!
//! Every gym owns a schema named after its DNS-safe domain. The domain is
//! validated before it ever reaches DDL and is always quoted. Request handlers
//! get the tenant from the verified access claim, never from a client header.

pub mod api;
pub mod auth;
pub mod cli;
pub mod store;
pub mod tenant;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
