//! OAuth2 HTTP endpoints.

use crate::api::extract::FormOrJson;
use crate::oauth2::error::ErrorResponse;
use crate::oauth2::minter::TokenResponse;
use crate::oauth2::validation::{RawTokenRequest, ValidationErrors, validate_token_request};
use crate::oauth2::{OAUTH2_TAG, state::OAuth2State};
use axum::{
    Json,
    extract::State,
    response::{IntoResponse, Response},
};
use utoipa_axum::{router::OpenApiRouter, routes};

/// Creates the OAuth2 router.
pub fn router(state: OAuth2State) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(token))
        .with_state(state)
}

/// Token endpoint.
///
/// Issues a personal access token for the user whose credentials are presented,
/// on behalf of a registered client.
#[tracing::instrument(skip_all)]
#[utoipa::path(
    post,
    path = "/token",
    tag = OAUTH2_TAG,
    operation_id = "OAuth2 Token",
    summary = "Exchange user credentials for an access token",
    description = "Issues a bearer access token using the resource owner password credentials grant.\n\n\
                   **Supported grant types:**\n\
                   - `password`: Authenticate with `client_id`, `client_secret`, `username` (email) and `password`\n\n\
                   `client_credentials` and `refresh_token` pass validation but are rejected with \
                   `unsupported_grant_type`.\n\n\
                   The issued token always carries the full-access scope `*`; a requested `scope` is ignored. \
                   No refresh token is issued.\n\n\
                   The body may be sent as `application/x-www-form-urlencoded` or `application/json`.",
    request_body(
        content = RawTokenRequest,
        content_type = "application/x-www-form-urlencoded",
        description = "Token request parameters"
    ),
    responses(
        (status = 200, description = "Token issued successfully", body = TokenResponse),
        (status = 400, description = "Unsupported grant type or malformed request", body = ErrorResponse),
        (status = 401, description = "Invalid client or user credentials", body = ErrorResponse),
        (status = 422, description = "Request failed field validation", body = ValidationErrors),
        (status = 500, description = "Unexpected server failure", body = ErrorResponse),
    )
)]
pub async fn token(
    State(state): State<OAuth2State>,
    FormOrJson(raw): FormOrJson<RawTokenRequest>,
) -> Response {
    let request = match validate_token_request(raw) {
        Ok(request) => request,
        Err(errors) => {
            tracing::debug!(fields = ?errors.errors.keys().collect::<Vec<_>>(), "Token request failed validation");
            return errors.into_response();
        }
    };

    match state.service.issue(request).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => e.into_response(),
    }
}
