//! End-to-end flows through the HTTP router.
//!
//! Every test drives the real router with `tower::ServiceExt::oneshot`, backed
//! by the in-memory store and a manual clock, so token expiry and the demo
//! window are deterministic.

use anyhow::{Context, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Algorithm, Argon2, Params, Version,
};
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use secrecy::SecretString;
use serde_json::{json, Value};
use spotter::{
    api::{self, AppEnv},
    auth::{
        AuthConfig, AuthService, Clock, ManualClock, Role, TokenCodec, UserType,
        VerificationStatus,
    },
    store::{Backends, MemoryStore, PlatformAdmin, Tenant, TenantDirectory, TenantUser},
};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

const SECRET: &str = "integration-secret";
const GYM: &str = "iron-temple";

struct TestApp {
    store: Arc<MemoryStore>,
    clock: Arc<ManualClock>,
    router: Router,
    tenant: Tenant,
}

fn cheap_hash(password: &str) -> Result<String> {
    let params = Params::new(8, 1, 1, None).map_err(|e| anyhow::anyhow!("{e}"))?;
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password(password.as_bytes(), &SaltString::generate(&mut OsRng))
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow::anyhow!("{e}"))
}

impl TestApp {
    fn new(app_env: AppEnv) -> Result<Self> {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let now = clock.now();

        let tenant = Tenant {
            id: Uuid::new_v4(),
            name: "Iron Temple".to_string(),
            domain: GYM.to_string(),
            is_active: true,
            created_at: now,
        };
        store.insert_tenant(tenant.clone())?;
        store.insert_platform_admin(PlatformAdmin {
            id: Uuid::new_v4(),
            username: "root".to_string(),
            email: "root@spotter.fit".to_string(),
            password_hash: cheap_hash("p@ss")?,
            is_active: true,
            last_login_at: None,
            created_at: now,
        })?;

        let backends = Backends::in_memory(&store);
        let auth = Arc::new(AuthService::new(
            backends.clone(),
            TokenCodec::new(&SecretString::from(SECRET.to_string())),
            clock.clone(),
            AuthConfig::new().with_demo_window_seconds(14 * 24 * 60 * 60),
        ));
        let router = api::router(auth, backends, app_env);

        Ok(Self {
            store,
            clock,
            router,
            tenant,
        })
    }

    fn member(&self, username: &str, role: Role, status: VerificationStatus) -> Result<TenantUser> {
        let user = TenantUser {
            id: Uuid::new_v4(),
            tenant_id: self.tenant.id,
            username: username.to_string(),
            email: format!("{username}@{GYM}.fit"),
            password_hash: cheap_hash("lift")?,
            role,
            verification_status: status,
            is_active: true,
            last_login_at: None,
            created_at: self.clock.now(),
        };
        self.store.insert_tenant_user(user.clone())?;
        Ok(user)
    }

    async fn send(&self, request: Request<Body>) -> Result<(StatusCode, Value)> {
        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok((status, body))
    }

    async fn post(&self, path: &str, body: Value, gym: Option<&str>) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(gym) = gym {
            builder = builder.header("X-Gym-Domain", gym);
        }
        self.send(builder.body(Body::from(body.to_string()))?).await
    }

    async fn get(&self, path: &str, authorization: Option<&str>) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(Method::GET).uri(path);
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        self.send(builder.body(Body::empty())?).await
    }

    async fn login(&self, username: &str, password: &str, gym: Option<&str>) -> Result<(StatusCode, Value)> {
        self.post(
            "/auth/login",
            json!({"username": username, "password": password}),
            gym,
        )
        .await
    }

    async fn refresh(&self, token: &str) -> Result<(StatusCode, Value)> {
        self.post("/auth/refresh", json!({"refresh_token": token}), None)
            .await
    }

    async fn logout(&self, token: &str) -> Result<(StatusCode, Value)> {
        self.post("/auth/logout", json!({"refresh_token": token}), None)
            .await
    }
}

fn field<'a>(body: &'a Value, key: &str) -> Result<&'a str> {
    body[key]
        .as_str()
        .with_context(|| format!("missing {key} in {body}"))
}

#[tokio::test]
async fn happy_admin_login() -> Result<()> {
    let app = TestApp::new(AppEnv::Production)?;
    let (status, body) = app.login("root", "p@ss", None).await?;
    assert_eq!(status, StatusCode::OK);

    let codec = TokenCodec::new(&SecretString::from(SECRET.to_string()));
    let claims = codec.verify_access(field(&body, "access_token")?, app.clock.now())?;
    assert_eq!(claims.user_type, UserType::PlatformAdmin);
    assert_eq!(claims.tenant_id, None);
    assert_eq!(body["user_info"]["user_type"], "platform_admin");

    let records = app.store.refresh_tokens()?;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].token, field(&body, "refresh_token")?);
    assert_eq!(records[0].user_type, UserType::PlatformAdmin);
    assert_eq!(records[0].tenant_id, None);
    Ok(())
}

#[tokio::test]
async fn tenant_login_carries_gym_claims() -> Result<()> {
    let app = TestApp::new(AppEnv::Production)?;
    let user = app.member("ana", Role::User, VerificationStatus::Verified)?;

    let (status, body) = app.login("ana", "lift", Some(GYM)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_info"]["id"], user.id.to_string());
    assert_eq!(body["user_info"]["tenant_id"], app.tenant.id.to_string());
    assert_eq!(body["user_info"]["role"], "user");

    let records = app.store.refresh_tokens()?;
    assert_eq!(records[0].tenant_id, Some(app.tenant.id));
    Ok(())
}

#[tokio::test]
async fn demo_expired_login_is_rejected_without_a_token() -> Result<()> {
    let app = TestApp::new(AppEnv::Production)?;
    app.member("trial", Role::Guest, VerificationStatus::Demo)?;
    app.clock.advance(Duration::days(15));

    let (status, body) = app.login("trial", "lift", Some(GYM)).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], "error");
    assert_eq!(body["data"]["code"], "UNAUTHORIZED");
    assert!(app.store.refresh_tokens()?.is_empty());
    Ok(())
}

#[tokio::test]
async fn refresh_picks_up_role_change() -> Result<()> {
    let app = TestApp::new(AppEnv::Production)?;
    let user = app.member("ana", Role::User, VerificationStatus::Verified)?;

    let (_, login) = app.login("ana", "lift", Some(GYM)).await?;
    let refresh_token = field(&login, "refresh_token")?.to_string();

    app.clock.advance(Duration::seconds(30));
    app.store
        .update_tenant_user(app.tenant.id, user.id, |user| user.role = Role::Admin)?;
    app.clock.advance(Duration::seconds(30));

    let (status, refreshed) = app.refresh(&refresh_token).await?;
    assert_eq!(status, StatusCode::OK);

    let codec = TokenCodec::new(&SecretString::from(SECRET.to_string()));
    let now = app.clock.now();
    let before = codec.verify_access(field(&login, "access_token")?, now)?;
    let after = codec.verify_access(field(&refreshed, "access_token")?, now)?;
    assert_eq!(after.role, Some(Role::Admin));
    assert_eq!(after.user_id, before.user_id);
    assert!(after.exp > before.exp);
    assert_eq!(field(&refreshed, "refresh_token")?, refresh_token);
    Ok(())
}

#[tokio::test]
async fn second_login_evicts_first_refresh_token() -> Result<()> {
    let app = TestApp::new(AppEnv::Production)?;
    let (_, first) = app.login("root", "p@ss", None).await?;
    let (_, second) = app.login("root", "p@ss", None).await?;
    let r1 = field(&first, "refresh_token")?;
    let r2 = field(&second, "refresh_token")?;
    assert_ne!(r1, r2);

    assert_eq!(app.refresh(r1).await?.0, StatusCode::UNAUTHORIZED);
    assert_eq!(app.refresh(r2).await?.0, StatusCode::OK);
    assert_eq!(app.store.refresh_tokens()?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn logout_is_irreversible_and_idempotent() -> Result<()> {
    let app = TestApp::new(AppEnv::Production)?;
    let (_, login) = app.login("root", "p@ss", None).await?;
    let token = field(&login, "refresh_token")?;

    let (status, body) = app.logout(token).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");

    assert_eq!(app.refresh(token).await?.0, StatusCode::UNAUTHORIZED);
    assert_eq!(app.logout(token).await?.0, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn tampered_access_token_is_reported_invalid() -> Result<()> {
    let app = TestApp::new(AppEnv::Production)?;
    let (_, login) = app.login("root", "p@ss", None).await?;
    let token = field(&login, "access_token")?;

    // Every payload starts with `eyJ` (`{"`); any change breaks the signature.
    let (header, rest) = token.split_once('.').context("token has no payload")?;
    let tampered = format!("{header}.f{}", rest.get(1..).unwrap_or_default());

    let (status, body) = app
        .get("/auth/validate", Some(&format!("Bearer {tampered}")))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], false);
    assert_eq!(body["message"], "Invalid token");

    let (status, body) = app
        .get("/auth/validate", Some(&format!("Bearer {token}  ")))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);
    Ok(())
}

#[tokio::test]
async fn validate_requires_a_well_formed_header() -> Result<()> {
    let app = TestApp::new(AppEnv::Production)?;
    assert_eq!(
        app.get("/auth/validate", None).await?.0,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        app.get("/auth/validate", Some("Bearerabc")).await?.0,
        StatusCode::UNAUTHORIZED
    );
    Ok(())
}

#[tokio::test]
async fn access_token_is_invalid_at_exact_expiry() -> Result<()> {
    let app = TestApp::new(AppEnv::Production)?;
    let (_, login) = app.login("root", "p@ss", None).await?;
    let bearer = format!("Bearer {}", field(&login, "access_token")?);

    app.clock.advance(Duration::seconds(86_399));
    assert_eq!(app.get("/auth/validate", Some(&bearer)).await?.1["valid"], true);

    app.clock.advance(Duration::seconds(1));
    assert_eq!(app.get("/auth/validate", Some(&bearer)).await?.1["valid"], false);
    Ok(())
}

#[tokio::test]
async fn unknown_gym_is_invalid_credentials() -> Result<()> {
    let app = TestApp::new(AppEnv::Production)?;
    app.member("ana", Role::User, VerificationStatus::Verified)?;

    for gym in ["no-such-gym", "Not A Domain!"] {
        let (status, body) = app.login("ana", "lift", Some(gym)).await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Invalid credentials");
    }

    // A gym user is invisible to the platform-admin population.
    let (status, _) = app.login("ana", "lift", None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn deactivated_gym_blocks_login_and_refresh() -> Result<()> {
    let app = TestApp::new(AppEnv::Production)?;
    app.member("ana", Role::User, VerificationStatus::Verified)?;
    let (_, login) = app.login("ana", "lift", Some(GYM)).await?;
    let token = field(&login, "refresh_token")?;

    app.store.set_tenant_active(app.tenant.id, false)?;

    assert_eq!(
        app.login("ana", "lift", Some(GYM)).await?.0,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(app.refresh(token).await?.0, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn malformed_body_is_bad_request() -> Result<()> {
    let app = TestApp::new(AppEnv::Production)?;
    let (status, body) = app.post("/auth/login", json!({"username": "root"}), None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["data"]["code"], "BAD_REQUEST");

    let (status, _) = app.post("/auth/refresh", json!({"refresh_token": "  "}), None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn backend_outage_hides_detail_in_production() -> Result<()> {
    let app = TestApp::new(AppEnv::Production)?;
    app.store.set_available(false);

    let (status, body) = app.login("root", "p@ss", None).await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], "Internal server error");
    assert_eq!(body["data"]["code"], "INTERNAL");
    assert!(body["data"].get("error").is_none());
    Ok(())
}

#[tokio::test]
async fn backend_outage_shows_detail_in_dev() -> Result<()> {
    let app = TestApp::new(AppEnv::Dev)?;
    app.store.set_available(false);

    let (status, body) = app.login("root", "p@ss", None).await?;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let detail = body["data"]["error"].as_str().unwrap_or_default();
    assert!(detail.contains("store offline"), "unexpected detail: {detail}");
    Ok(())
}

#[tokio::test]
async fn me_reports_the_bound_principal() -> Result<()> {
    let app = TestApp::new(AppEnv::Production)?;
    let user = app.member("guesty", Role::Guest, VerificationStatus::Demo)?;
    let (_, login) = app.login("guesty", "lift", Some(GYM)).await?;
    let bearer = format!("Bearer {}", field(&login, "access_token")?);

    let (status, body) = app.get("/auth/me", Some(&bearer)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], user.id.to_string());
    assert_eq!(body["tenant_id"], app.tenant.id.to_string());
    assert_eq!(body["role"], "guest");
    assert!(body["limitation"].is_string());

    assert_eq!(app.get("/auth/me", None).await?.0, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn health_reports_store_state() -> Result<()> {
    let app = TestApp::new(AppEnv::Production)?;
    let (status, body) = app.get("/health", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"], "ok");

    app.store.set_available(false);
    assert_eq!(
        app.get("/health", None).await?.0,
        StatusCode::SERVICE_UNAVAILABLE
    );
    Ok(())
}

#[tokio::test]
async fn responses_carry_a_request_id() -> Result<()> {
    let app = TestApp::new(AppEnv::Production)?;
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())?;
    let response = app.router.clone().oneshot(request).await?;
    assert!(response.headers().contains_key("x-request-id"));

    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "req-123")
        .body(Body::empty())?;
    let response = app.router.clone().oneshot(request).await?;
    assert_eq!(
        response.headers().get("x-request-id").and_then(|v| v.to_str().ok()),
        Some("req-123")
    );
    Ok(())
}

async fn post_gym(
    app: &TestApp,
    bearer: &str,
    body: Value,
) -> Result<(StatusCode, Value)> {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/admin/gyms")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, bearer)
        .body(Body::from(body.to_string()))?;
    app.send(request).await
}

#[tokio::test]
async fn platform_admin_onboards_a_gym() -> Result<()> {
    let app = TestApp::new(AppEnv::Production)?;
    let (_, login) = app.login("root", "p@ss", None).await?;
    let bearer = format!("Bearer {}", field(&login, "access_token")?);

    let (status, body) = post_gym(
        &app,
        &bearer,
        json!({"name": "Barbell Club", "domain": "barbell-club"}),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["domain"], "barbell-club");
    assert!(app.store.has_schema("barbell-club")?);

    let (status, body) = post_gym(
        &app,
        &bearer,
        json!({"name": "Copycat", "domain": "barbell-club"}),
    )
    .await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["data"]["code"], "CONFLICT");

    let (status, _) = post_gym(
        &app,
        &bearer,
        json!({"name": "Bad", "domain": "Bad Domain"}),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn gym_staff_cannot_onboard_gyms() -> Result<()> {
    let app = TestApp::new(AppEnv::Production)?;
    app.member("coach", Role::Admin, VerificationStatus::Verified)?;
    let (_, login) = app.login("coach", "lift", Some(GYM)).await?;
    let bearer = format!("Bearer {}", field(&login, "access_token")?);

    let (status, body) = post_gym(
        &app,
        &bearer,
        json!({"name": "Side Hustle", "domain": "side-hustle"}),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["data"]["code"], "FORBIDDEN");
    assert!(!app.store.has_schema("side-hustle")?);

    let (status, _) = post_gym(&app, "Bearer not-a-jwt", json!({})).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn unknown_route_is_enveloped_not_found() -> Result<()> {
    let app = TestApp::new(AppEnv::Production)?;
    let (status, body) = app.get("/no/such/route", None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "error");
    assert_eq!(body["data"]["code"], "NOT_FOUND");
    Ok(())
}

#[tokio::test]
async fn unreadable_gym_header_is_invalid_credentials() -> Result<()> {
    let app = TestApp::new(AppEnv::Production)?;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .header(
            "X-Gym-Domain",
            header::HeaderValue::from_bytes(b"iron-templ\xe9")?,
        )
        .body(Body::from(
            json!({"username": "root", "password": "p@ss"}).to_string(),
        ))?;

    let (status, body) = app.send(request).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid credentials");
    assert!(app.store.refresh_tokens()?.is_empty());
    Ok(())
}

#[tokio::test]
async fn leftover_gym_schema_is_never_reused() -> Result<()> {
    let app = TestApp::new(AppEnv::Production)?;
    let (_, login) = app.login("root", "p@ss", None).await?;
    let bearer = format!("Bearer {}", field(&login, "access_token")?);
    let gym = json!({"name": "Barbell Club", "domain": "barbell-club"});

    let (status, created) = post_gym(&app, &bearer, gym.clone()).await?;
    assert_eq!(status, StatusCode::CREATED);
    let id: Uuid = field(&created, "id")?.parse()?;
    app.store.delete_tenant(id).await?;

    let (status, body) = post_gym(&app, &bearer, gym).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Gym domain is unavailable");
    assert!(app.store.find_tenant_by_domain("barbell-club").await?.is_none());

    let (status, _) = post_gym(
        &app,
        &bearer,
        json!({"name": "Everyone", "domain": "public"}),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}
