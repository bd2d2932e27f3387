use utoipa::{
    openapi::{
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
        Contact, License,
    },
    Modify, OpenApi,
};

use super::error::{ErrorData, ErrorEnvelope, MessageEnvelope, Status};
use super::handlers::{auth, gyms, health};
use crate::auth::{
    AccessClaims, AuthResponse, Role, TokenType, UserInfo, UserType, ValidateResponse,
    VerificationStatus,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::login,
        auth::refresh,
        auth::logout,
        auth::validate,
        auth::me,
        gyms::create_gym,
        health::health,
    ),
    components(schemas(
        auth::LoginRequest,
        auth::RefreshRequest,
        auth::MeResponse,
        gyms::CreateGymRequest,
        gyms::GymResponse,
        health::Health,
        AuthResponse,
        UserInfo,
        ValidateResponse,
        AccessClaims,
        TokenType,
        UserType,
        Role,
        VerificationStatus,
        MessageEnvelope,
        ErrorEnvelope,
        ErrorData,
        Status,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "auth", description = "Login, token refresh and validation"),
        (name = "gyms", description = "Gym onboarding for platform admins"),
        (name = "health", description = "Service health"),
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// The document served at `/api-docs/openapi.json`, with Cargo metadata.
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    doc.info.title = env!("CARGO_PKG_NAME").to_string();
    doc.info.version = env!("CARGO_PKG_VERSION").to_string();
    doc.info.description = optional_str(env!("CARGO_PKG_DESCRIPTION")).map(str::to_string);
    doc.info.contact = cargo_contact();
    doc.info.license = optional_str(env!("CARGO_PKG_LICENSE")).map(|id| {
        let mut license = License::new(id);
        license.identifier = Some(id.to_string());
        license
    });
    doc
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let primary = env!("CARGO_PKG_AUTHORS").split(';').next().map(str::trim)?;
    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    match (author.find('<'), author.rfind('>')) {
        (Some(start), Some(end)) if start < end => (
            optional_str(author[..start].trim()),
            optional_str(author[start + 1..end].trim()),
        ),
        _ => (optional_str(author), None),
    }
}

fn optional_str(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}
