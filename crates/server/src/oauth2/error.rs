//! Error unification for the token endpoint.
//!
//! Every stage returns its own typed error; this is the single place where those
//! are translated into the external contract.

use crate::error::StoreError;
use crate::oauth2::client::{ClientAuthError, ClientRejection};
use crate::oauth2::grant::GrantError;
use crate::oauth2::minter::MintError;
use crate::oauth2::user::{UserAuthError, UserRejection};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use utoipa::ToSchema;

const UNSUPPORTED_GRANT_DESCRIPTION: &str =
    "The authorization grant type is not supported by the authorization server.";
const SERVER_ERROR_DESCRIPTION: &str = "An error occurred while processing the token request.";

/// Error body returned by the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error code (e.g., "invalid_client", "invalid_grant")
    pub error: String,
    /// Human-readable error description
    pub error_description: String,
    /// Human-readable message
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: &str, description: &str, message: &str) -> Self {
        Self {
            error: error.to_string(),
            error_description: description.to_string(),
            message: message.to_string(),
            hint: None,
        }
    }

    /// The generic body used for every unexpected failure.
    pub fn server_error() -> Self {
        Self::new("server_error", SERVER_ERROR_DESCRIPTION, "Token request failed.")
    }
}

/// Stage of the issuance flow an internal failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ClientAuthentication,
    UserAuthentication,
    TokenMinting,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::ClientAuthentication => f.write_str("client_authentication"),
            Stage::UserAuthentication => f.write_str("user_authentication"),
            Stage::TokenMinting => f.write_str("token_minting"),
        }
    }
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token request: {0}")]
    Request(#[from] GrantError),
    #[error("client rejected: {0}")]
    Client(ClientRejection),
    #[error("user rejected: {0}")]
    User(UserRejection),
    #[error("internal failure during {stage}: {source}")]
    Internal {
        stage: Stage,
        #[source]
        source: StoreError,
    },
}

impl From<ClientAuthError> for TokenError {
    fn from(err: ClientAuthError) -> Self {
        match err {
            ClientAuthError::InvalidClient(reason) => TokenError::Client(reason),
            ClientAuthError::Store(source) => TokenError::Internal {
                stage: Stage::ClientAuthentication,
                source,
            },
        }
    }
}

impl From<UserAuthError> for TokenError {
    fn from(err: UserAuthError) -> Self {
        match err {
            UserAuthError::Rejected(reason) => TokenError::User(reason),
            UserAuthError::Store(source) => TokenError::Internal {
                stage: Stage::UserAuthentication,
                source,
            },
        }
    }
}

impl From<MintError> for TokenError {
    fn from(err: MintError) -> Self {
        match err {
            MintError::Store(source) => TokenError::Internal {
                stage: Stage::TokenMinting,
                source,
            },
        }
    }
}

impl TokenError {
    pub fn status(&self) -> StatusCode {
        match self {
            TokenError::Request(_) => StatusCode::BAD_REQUEST,
            TokenError::Client(_) | TokenError::User(_) => StatusCode::UNAUTHORIZED,
            TokenError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// External representation. Carries no detail beyond the error category.
    pub fn body(&self) -> ErrorResponse {
        match self {
            TokenError::Request(GrantError::UnsupportedGrantType(_)) => ErrorResponse {
                hint: Some("Only \"password\" grant type is supported".to_string()),
                ..ErrorResponse::new(
                    "unsupported_grant_type",
                    UNSUPPORTED_GRANT_DESCRIPTION,
                    UNSUPPORTED_GRANT_DESCRIPTION,
                )
            },
            TokenError::Request(GrantError::MissingParameter(name)) => ErrorResponse::new(
                "invalid_request",
                "The request is missing a required parameter, includes an invalid parameter value, \
                 includes a parameter more than once, or is otherwise malformed.",
                &format!("The {name} field is required."),
            ),
            TokenError::Request(GrantError::UnexpectedParameter(name)) => ErrorResponse::new(
                "invalid_request",
                "The request is missing a required parameter, includes an invalid parameter value, \
                 includes a parameter more than once, or is otherwise malformed.",
                &format!("The {name} field is not allowed for the password grant type."),
            ),
            TokenError::Client(_) => ErrorResponse::new(
                "invalid_client",
                "Client authentication failed.",
                "Invalid client credentials.",
            ),
            TokenError::User(_) => ErrorResponse::new(
                "invalid_grant",
                "The provided authorization grant is invalid.",
                "Invalid user credentials.",
            ),
            TokenError::Internal { .. } => ErrorResponse::server_error(),
        }
    }

    /// Record the failure for operators. Secrets never reach this point.
    pub fn log(&self) {
        match self {
            TokenError::Internal { stage, source } => {
                tracing::error!(%stage, error = %source, "Token request failed");
            }
            TokenError::Request(e) => tracing::info!(error = %e, "Token request rejected"),
            TokenError::Client(reason) => tracing::warn!(%reason, "Client authentication failed"),
            TokenError::User(reason) => tracing::warn!(%reason, "User authentication failed"),
        }
    }
}

impl IntoResponse for TokenError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth2::grant::GrantType;

    #[test]
    fn test_error_table() {
        let cases = [
            (
                TokenError::Request(GrantError::UnsupportedGrantType(
                    GrantType::ClientCredentials,
                )),
                400,
                "unsupported_grant_type",
            ),
            (
                TokenError::Request(GrantError::MissingParameter("client_id")),
                400,
                "invalid_request",
            ),
            (TokenError::Client(ClientRejection::NoMatch), 401, "invalid_client"),
            (TokenError::Client(ClientRejection::Revoked), 401, "invalid_client"),
            (TokenError::User(UserRejection::UnknownUser), 401, "invalid_grant"),
            (
                TokenError::User(UserRejection::PasswordMismatch),
                401,
                "invalid_grant",
            ),
            (
                TokenError::Internal {
                    stage: Stage::UserAuthentication,
                    source: StoreError::Unavailable("boom".into()),
                },
                500,
                "server_error",
            ),
        ];

        for (err, status, code) in cases {
            assert_eq!(err.status().as_u16(), status, "{err}");
            assert_eq!(err.body().error, code, "{err}");
        }
    }

    #[test]
    fn test_unsupported_grant_body_has_hint() {
        let body = TokenError::Request(GrantError::UnsupportedGrantType(GrantType::RefreshToken))
            .body();
        assert_eq!(
            body.hint.as_deref(),
            Some("Only \"password\" grant type is supported")
        );
        assert_eq!(body.error_description, body.message);
    }

    #[test]
    fn test_user_rejections_share_one_body() {
        let unknown = TokenError::User(UserRejection::UnknownUser).body();
        let mismatch = TokenError::User(UserRejection::PasswordMismatch).body();
        assert_eq!(unknown, mismatch);
        assert_eq!(
            serde_json::to_string(&unknown).unwrap(),
            serde_json::to_string(&mismatch).unwrap()
        );
    }

    #[test]
    fn test_client_rejections_share_one_body() {
        assert_eq!(
            TokenError::Client(ClientRejection::NoMatch).body(),
            TokenError::Client(ClientRejection::Revoked).body()
        );
    }

    #[test]
    fn test_internal_detail_never_in_body() {
        let err = TokenError::Internal {
            stage: Stage::TokenMinting,
            source: StoreError::Unavailable("db-host.internal:5432 refused".into()),
        };
        let body = serde_json::to_string(&err.body()).unwrap();
        assert!(!body.contains("db-host"));
        assert!(!body.contains("token_minting"));
        assert!(err.to_string().contains("db-host"));
    }

    #[test]
    fn test_hint_omitted_when_absent() {
        let json = serde_json::to_value(ErrorResponse::server_error()).unwrap();
        assert!(json.get("hint").is_none());
        assert_eq!(json["error"], "server_error");
        assert_eq!(json["message"], "Token request failed.");
    }
}
