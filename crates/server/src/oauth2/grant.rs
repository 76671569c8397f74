//! Grant validation.
//!
//! The request schema advertises three grant types but only the resource owner
//! password grant is processed end to end. Everything else is rejected here,
//! before any client or user lookup happens.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use utoipa::ToSchema;

/// Grant types accepted by request validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    Password,
    ClientCredentials,
    RefreshToken,
}

impl GrantType {
    pub const ALL: [GrantType; 3] = [
        GrantType::Password,
        GrantType::ClientCredentials,
        GrantType::RefreshToken,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GrantType::Password => "password",
            GrantType::ClientCredentials => "client_credentials",
            GrantType::RefreshToken => "refresh_token",
        }
    }
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown grant type: {0}")]
pub struct UnknownGrantType(pub String);

impl FromStr for GrantType {
    type Err = UnknownGrantType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GrantType::ALL
            .into_iter()
            .find(|g| g.as_str() == s)
            .ok_or_else(|| UnknownGrantType(s.to_string()))
    }
}

/// A syntactically valid token request, as handed over by request validation.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenRequest {
    pub grant_type: GrantType,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub scope: Option<String>,
    pub refresh_token: Option<String>,
}

impl TokenRequest {
    /// A password grant request with every required field populated.
    pub fn password(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            grant_type: GrantType::Password,
            client_id: Some(client_id.into()),
            client_secret: Some(client_secret.into()),
            username: Some(username.into()),
            password: Some(password.into()),
            scope: None,
            refresh_token: None,
        }
    }

    /// A request of the given grant type with no fields populated.
    pub fn empty(grant_type: GrantType) -> Self {
        Self {
            grant_type,
            client_id: None,
            client_secret: None,
            username: None,
            password: None,
            scope: None,
            refresh_token: None,
        }
    }
}

impl fmt::Debug for TokenRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRequest")
            .field("grant_type", &self.grant_type)
            .field("client_id", &self.client_id)
            .field("client_secret", &redacted(&self.client_secret))
            .field("username", &self.username)
            .field("password", &redacted(&self.password))
            .field("scope", &self.scope)
            .field("refresh_token", &redacted(&self.refresh_token))
            .finish()
    }
}

/// Password grant that passed validation; every credential is present.
#[derive(Clone, PartialEq, Eq)]
pub struct ValidatedGrant {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    pub scope: Option<String>,
}

impl fmt::Debug for ValidatedGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatedGrant")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("scope", &self.scope)
            .finish()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GrantError {
    #[error("grant type `{0}` is not supported")]
    UnsupportedGrantType(GrantType),
    #[error("missing required parameter `{0}`")]
    MissingParameter(&'static str),
    #[error("parameter `{0}` is not allowed for the password grant")]
    UnexpectedParameter(&'static str),
}

/// Check the grant type and its companion fields.
///
/// The grant type is checked first, so a non-password request is rejected
/// whatever else it carries.
pub fn validate(request: TokenRequest) -> Result<ValidatedGrant, GrantError> {
    if request.grant_type != GrantType::Password {
        return Err(GrantError::UnsupportedGrantType(request.grant_type));
    }

    let client_id = required(request.client_id, "client_id")?;
    let client_secret = required(request.client_secret, "client_secret")?;
    let username = required(request.username, "username")?;
    let password = required(request.password, "password")?;

    if present(request.refresh_token).is_some() {
        return Err(GrantError::UnexpectedParameter("refresh_token"));
    }

    Ok(ValidatedGrant {
        client_id,
        client_secret,
        username,
        password,
        scope: present(request.scope),
    })
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn required(value: Option<String>, name: &'static str) -> Result<String, GrantError> {
    present(value).ok_or(GrantError::MissingParameter(name))
}

fn redacted(value: &Option<String>) -> Option<&'static str> {
    value.as_ref().map(|_| "<redacted>")
}
