use anyhow::Result;
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Extension, Router,
};
use std::{fmt, str::FromStr, sync::Arc};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::AuthService;
use crate::store::Backends;

pub mod error;
pub mod handlers;
pub mod middleware;
mod openapi;

pub use error::{ApiError, ErrorKind};
pub use openapi::{openapi, ApiDoc};

const REQUEST_ID: &str = "x-request-id";

/// Deployment mode. Only `dev` exposes inner error text in responses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AppEnv {
    Dev,
    #[default]
    Production,
}

impl AppEnv {
    #[must_use]
    pub fn is_dev(self) -> bool {
        self == Self::Dev
    }
}

impl FromStr for AppEnv {
    type Err = std::convert::Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(if value.trim().eq_ignore_ascii_case("dev") {
            Self::Dev
        } else {
            Self::Production
        })
    }
}

impl fmt::Display for AppEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Dev => "dev",
            Self::Production => "production",
        })
    }
}

async fn not_found() -> ApiError {
    ApiError::not_found("Resource not found")
}

/// All routes with their layers, ready to serve.
#[must_use]
pub fn router(auth: Arc<AuthService>, backends: Backends, app_env: AppEnv) -> Router {
    let protected = Router::new()
        .route("/auth/me", get(handlers::auth::me))
        .route("/admin/gyms", post(handlers::gyms::create_gym))
        .route_layer(from_fn(middleware::require_bearer));

    Router::new()
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/refresh", post(handlers::auth::refresh))
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/auth/validate", get(handlers::auth::validate))
        .route(
            "/health",
            get(handlers::health::health).options(handlers::health::health),
        )
        .merge(protected)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi()))
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static(REQUEST_ID),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    REQUEST_ID,
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(from_fn_with_state(app_env, error::expose_detail))
                .layer(Extension(auth))
                .layer(Extension(backends)),
        )
}

/// Serve on `[::]:port` until ctrl-c.
///
/// # Errors
/// Returns an error if the listener cannot bind or the server fails.
pub async fn new(
    port: u16,
    auth: Arc<AuthService>,
    backends: Backends,
    app_env: AppEnv,
) -> Result<()> {
    let app = router(auth, backends, app_env);

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{} ({app_env})", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID)
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_env_only_dev_is_dev() {
        assert_eq!("dev".parse::<AppEnv>(), Ok(AppEnv::Dev));
        assert_eq!(" DEV ".parse::<AppEnv>(), Ok(AppEnv::Dev));
        assert_eq!("production".parse::<AppEnv>(), Ok(AppEnv::Production));
        assert_eq!("staging".parse::<AppEnv>(), Ok(AppEnv::Production));
        assert_eq!("".parse::<AppEnv>(), Ok(AppEnv::Production));
        assert!(!AppEnv::default().is_dev());
    }
}
