//! Field-level request validation.
//!
//! Runs before the issuance core and rejects malformed requests with a
//! `422 Unprocessable Entity` envelope listing the offending fields.

use crate::oauth2::grant::{GrantType, TokenRequest};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Deserializer, Serialize, de::IgnoredAny};
use std::collections::BTreeMap;
use std::fmt;
use utoipa::ToSchema;

/// Minimum length of a newly registered password.
pub const MIN_PASSWORD_LENGTH: usize = 8;

pub const EMAIL_TAKEN: &str = "The email has already been taken.";

/// Validation failure envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ValidationErrors {
    /// First error message, with a count of the remaining ones
    pub message: String,
    /// Messages keyed by field name
    pub errors: BTreeMap<String, Vec<String>>,
    #[serde(skip)]
    count: usize,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-field failure.
    pub fn single(field: &str, message: &str) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: &str) {
        if self.count == 0 {
            self.message = message.to_string();
        }
        self.count += 1;
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn has(&self, field: &str) -> bool {
        self.errors.contains_key(field)
    }

    fn finish<T>(mut self, value: T) -> Result<T, Self> {
        if self.is_empty() {
            return Ok(value);
        }
        let more = self.count - 1;
        if more > 0 {
            let noun = if more == 1 { "error" } else { "errors" };
            self.message = format!("{} (and {more} more {noun})", self.message);
        }
        Err(self)
    }
}

impl IntoResponse for ValidationErrors {
    fn into_response(self) -> Response {
        (StatusCode::UNPROCESSABLE_ENTITY, Json(self)).into_response()
    }
}

/// Token request exactly as it arrived, before any rule was applied.
///
/// Scalars of any JSON type are read as text and structured values as absent,
/// so a body that parses at all always reaches the field rules.
#[derive(Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct RawTokenRequest {
    /// One of `password`, `client_credentials`, `refresh_token`
    #[serde(deserialize_with = "lenient_text")]
    pub grant_type: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub client_id: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub client_secret: Option<String>,
    /// Email address of the user
    #[serde(deserialize_with = "lenient_text")]
    pub username: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub password: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub scope: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub refresh_token: Option<String>,
}

impl fmt::Debug for RawTokenRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawTokenRequest")
            .field("grant_type", &self.grant_type)
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// Registration request exactly as it arrived.
#[derive(Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct RawRegistrationRequest {
    #[serde(deserialize_with = "lenient_text")]
    pub email: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub password: Option<String>,
    #[serde(deserialize_with = "lenient_text")]
    pub password_confirmation: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LooseValue {
    Text(String),
    Signed(i64),
    Unsigned(u64),
    Float(f64),
    Bool(bool),
    Other(IgnoredAny),
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match LooseValue::deserialize(deserializer)? {
        LooseValue::Text(s) => Some(s),
        LooseValue::Signed(n) => Some(n.to_string()),
        LooseValue::Unsigned(n) => Some(n.to_string()),
        LooseValue::Float(n) => Some(n.to_string()),
        LooseValue::Bool(b) => Some(b.to_string()),
        LooseValue::Other(_) => None,
    })
}

impl fmt::Debug for RawRegistrationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawRegistrationRequest")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Registration request that passed validation.
#[derive(Clone, PartialEq, Eq)]
pub struct RegistrationRequest {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for RegistrationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Apply the token request rules.
///
/// Field rules only apply to the password grant. The other two grant types pass
/// straight through so the core can answer `unsupported_grant_type` for them no
/// matter what else was sent.
pub fn validate_token_request(raw: RawTokenRequest) -> Result<TokenRequest, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let Some(grant_type) = filled(&raw.grant_type) else {
        errors.add("grant_type", "Grant type is required.");
        return errors.finish(TokenRequest::empty(GrantType::Password));
    };
    let grant_type = match grant_type.parse::<GrantType>() {
        Ok(g) => g,
        Err(_) => {
            errors.add(
                "grant_type",
                "Grant type must be one of: password, client_credentials, refresh_token.",
            );
            return errors.finish(TokenRequest::empty(GrantType::Password));
        }
    };

    let username = raw.username.map(|u| u.trim().to_string());

    if grant_type == GrantType::Password {
        if filled(&raw.client_id).is_none() {
            errors.add("client_id", "Client ID is required.");
        }
        if filled(&raw.client_secret).is_none() {
            errors.add("client_secret", "Client secret is required.");
        }
        match filled(&username) {
            None => errors.add("username", "Username is required for password grant type."),
            Some(username) if !is_valid_email(username) => {
                errors.add("username", "Username must be a valid email address.")
            }
            Some(_) => {}
        }
        if filled(&raw.password).is_none() {
            errors.add("password", "Password is required for password grant type.");
        }
    }

    errors.finish(TokenRequest {
        grant_type,
        client_id: raw.client_id,
        client_secret: raw.client_secret,
        username,
        password: raw.password,
        scope: raw.scope,
        refresh_token: raw.refresh_token,
    })
}

/// Apply the registration rules. `email_taken` is the result of the uniqueness
/// lookup the caller ran against the user store.
pub fn validate_registration(
    raw: RawRegistrationRequest,
    email_taken: bool,
) -> Result<RegistrationRequest, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let email = raw.email.as_deref().map(str::trim).unwrap_or_default();
    if email.is_empty() {
        errors.add("email", "The email field is required.");
    } else if !is_valid_email(email) {
        errors.add("email", "The email field must be a valid email address.");
    } else if email_taken {
        errors.add("email", EMAIL_TAKEN);
    }

    let password = raw.password.unwrap_or_default();
    if password.is_empty() {
        errors.add("password", "The password field is required.");
    } else {
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            errors.add(
                "password",
                &format!("The password field must be at least {MIN_PASSWORD_LENGTH} characters."),
            );
        }
        if raw.password_confirmation.as_deref() != Some(password.as_str()) {
            errors.add("password", "The password field confirmation does not match.");
        }
    }

    if filled(&raw.password_confirmation).is_none() {
        errors.add(
            "password_confirmation",
            "The password confirmation field is required.",
        );
    }

    errors.finish(RegistrationRequest {
        email: email.to_string(),
        password,
    })
}

/// Pragmatic address check: one `@`, a non-empty local part and a domain of
/// non-empty labels. Single-label hosts such as `localhost` are accepted.
pub fn is_valid_email(value: &str) -> bool {
    if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    domain
        .split('.')
        .all(|l| !l.is_empty() && !l.starts_with('-') && !l.ends_with('-'))
}

fn filled(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
