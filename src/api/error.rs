//! Response envelope shared by every endpoint.
//!
//! Errors render as `{status: "error", message, data: {code}}`. The inner
//! error text travels with the response as an extension; [`expose_detail`]
//! copies it into `data.error` only when running with `APP_ENV=dev`.

use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};
use utoipa::ToSchema;

use super::AppEnv;
use crate::auth::AuthError;
use crate::store::StoreError;
use crate::tenant::ProvisionError;

const INTERNAL_MESSAGE: &str = "Internal server error";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    Internal,
}

impl ErrorKind {
    #[must_use]
    pub const fn status(self) -> StatusCode {
        match self {
            Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict => StatusCode::CONFLICT,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::BadRequest => "BAD_REQUEST",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::Internal => "INTERNAL",
        }
    }

    /// Kind for a wire code; anything unrecognized is a bad request.
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        match code {
            "UNAUTHORIZED" => Self::Unauthorized,
            "FORBIDDEN" => Self::Forbidden,
            "NOT_FOUND" => Self::NotFound,
            "CONFLICT" => Self::Conflict,
            "INTERNAL" => Self::Internal,
            _ => Self::BadRequest,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

/// Success body for endpoints without a payload of their own.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageEnvelope {
    pub status: Status,
    pub message: String,
}

impl MessageEnvelope {
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: Status::Success,
            message: message.into(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorData {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `{status: "error", message, data: {code, error?}}`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorEnvelope {
    pub status: Status,
    pub message: String,
    pub data: ErrorData,
}

/// Inner error text attached to an error response.
#[derive(Clone, Debug)]
pub struct ErrorDetail {
    kind: ErrorKind,
    message: String,
    detail: String,
}

#[derive(Debug)]
pub struct ApiError {
    kind: ErrorKind,
    message: String,
    detail: Option<String>,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: None,
        }
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// 500 with a generic message; `detail` is logged and shown only in dev.
    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, INTERNAL_MESSAGE).with_detail(detail)
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

fn render(kind: ErrorKind, message: String, error: Option<String>) -> Response {
    let body = ErrorEnvelope {
        status: Status::Error,
        message,
        data: ErrorData {
            code: kind.code().to_string(),
            error,
        },
    };
    (kind.status(), Json(body)).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let detail = self.detail.unwrap_or_else(|| self.message.clone());
        match self.kind {
            ErrorKind::Internal => error!(code = self.kind.code(), "{detail}"),
            ErrorKind::Forbidden | ErrorKind::Conflict => {
                warn!(code = self.kind.code(), "{detail}");
            }
            _ => debug!(code = self.kind.code(), "{detail}"),
        }

        let mut response = render(self.kind, self.message.clone(), None);
        response.extensions_mut().insert(ErrorDetail {
            kind: self.kind,
            message: self.message,
            detail,
        });
        response
    }
}

/// Re-render error bodies with their inner text when running in dev mode.
pub async fn expose_detail(State(app_env): State<AppEnv>, request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    if !app_env.is_dev() {
        return response;
    }
    let Some(detail) = response.extensions().get::<ErrorDetail>().cloned() else {
        return response;
    };

    let (parts, _) = response.into_parts();
    let mut rendered = render(detail.kind, detail.message.clone(), Some(detail.detail.clone()));
    for (name, value) in &parts.headers {
        if name != header::CONTENT_LENGTH && name != header::CONTENT_TYPE {
            rendered.headers_mut().insert(name.clone(), value.clone());
        }
    }
    rendered.extensions_mut().insert(detail);
    rendered
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => Self::unauthorized("Invalid credentials"),
            AuthError::AccountDisabled => {
                Self::unauthorized("Account is not available").with_detail("account disabled")
            }
            AuthError::DemoExpired => Self::unauthorized("Demo period has expired"),
            AuthError::Unauthorized(message) => Self::unauthorized(message),
            AuthError::Internal(detail) => Self::internal(detail),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(detail) => Self::conflict("Resource already exists").with_detail(detail),
            StoreError::BackendUnavailable(detail) => Self::internal(detail),
        }
    }
}

impl From<ProvisionError> for ApiError {
    fn from(err: ProvisionError) -> Self {
        match err {
            ProvisionError::InvalidDomain => Self::bad_request("Invalid gym domain"),
            ProvisionError::NamespaceTaken(domain) => {
                Self::conflict("Gym domain is unavailable").with_detail(format!("schema {domain} exists"))
            }
            ProvisionError::Failed(detail) => Self::internal(detail),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request("Invalid request body").with_detail(rejection.body_text())
    }
}
