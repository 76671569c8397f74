//! Registration HTTP endpoint.

use crate::api::extract::FormOrJson;
use crate::oauth2::user::User;
use crate::oauth2::validation::{RawRegistrationRequest, ValidationErrors};
use crate::registration::{REGISTRATION_TAG, RegistrationService};
use axum::{
    Json,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// Media type of JSON:API documents.
pub const JSON_API_CONTENT_TYPE: &str = "application/vnd.api+json";

#[derive(Clone)]
pub struct RegistrationState {
    pub service: RegistrationService,
    /// Public base URL used to build resource links
    pub base_url: String,
}

impl RegistrationState {
    pub fn new(service: RegistrationService, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { service, base_url }
    }
}

pub fn router(state: RegistrationState) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(register))
        .with_state(state)
}

/// JSON:API document wrapping a single user.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserDocument {
    pub data: UserResource,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResource {
    /// Always `users`
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    pub attributes: UserAttributes,
    pub links: ResourceLinks,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserAttributes {
    /// RFC 3339 timestamp
    pub created_at: String,
    /// RFC 3339 timestamp
    pub updated_at: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ResourceLinks {
    #[serde(rename = "self")]
    pub self_link: String,
}

impl UserDocument {
    pub fn new(user: &User, base_url: &str) -> Self {
        Self {
            data: UserResource {
                kind: "users".to_string(),
                id: user.id.clone(),
                attributes: UserAttributes {
                    created_at: rfc3339(user.created_at),
                    updated_at: rfc3339(user.updated_at),
                    email: user.email.clone(),
                },
                links: ResourceLinks {
                    self_link: format!("{base_url}/api/v1/users/{}", user.id),
                },
            },
        }
    }
}

fn rfc3339(at: time::OffsetDateTime) -> String {
    // Rfc3339 only fails for years outside 0..=9999.
    at.format(&Rfc3339).unwrap_or_else(|_| at.unix_timestamp().to_string())
}

/// Register a new user.
#[tracing::instrument(skip_all)]
#[utoipa::path(
    post,
    path = "/register",
    tag = REGISTRATION_TAG,
    operation_id = "Register User",
    summary = "Create a user account without authentication",
    description = "Creates a new user that can then obtain tokens from the token endpoint.\n\n\
                   Only available while registration is enabled and accounts are managed locally; \
                   otherwise the request is refused with `403` before it is validated.\n\n\
                   **Rules:**\n\
                   - `email`: required, a valid address, not already registered\n\
                   - `password`: required, at least 8 characters, must match `password_confirmation`",
    request_body(
        content = RawRegistrationRequest,
        content_type = "application/json",
        description = "New account details"
    ),
    responses(
        (status = 200, description = "User created", body = UserDocument, content_type = "application/vnd.api+json"),
        (status = 403, description = "Registration is disabled", body = ValidationErrors),
        (status = 422, description = "Request failed validation", body = ValidationErrors),
    )
)]
pub async fn register(
    State(state): State<RegistrationState>,
    FormOrJson(raw): FormOrJson<RawRegistrationRequest>,
) -> Response {
    match state.service.register(raw).await {
        Ok(user) => (
            [(header::CONTENT_TYPE, JSON_API_CONTENT_TYPE)],
            Json(UserDocument::new(&user, &state.base_url)),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}
