//! Token minting.
//!
//! Every token minted here carries the unrestricted `*` scope, whatever the
//! caller asked for, and announces a fixed one hour lifetime. No refresh token
//! is issued on this path.

use crate::error::StoreError;
use crate::oauth2::store::TokenStore;
use crate::oauth2::user::User;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use utoipa::ToSchema;

pub const FULL_ACCESS_SCOPE: &str = "*";
pub const TOKEN_TYPE: &str = "Bearer";
/// Lifetime announced in `expires_in`, in seconds.
pub const DECLARED_EXPIRES_IN: i64 = 3600;

/// Successful token response.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    /// Always `Bearer`
    #[schema(example = "Bearer")]
    pub token_type: String,
    /// Announced lifetime in seconds
    #[schema(example = 3600)]
    pub expires_in: i64,
    /// Opaque access token
    pub access_token: String,
    /// Always `null`; tokens minted by the password grant cannot be renewed
    #[schema(value_type = Option<String>)]
    pub refresh_token: Option<String>,
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum MintError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone)]
pub struct TokenMinter {
    store: Arc<dyn TokenStore>,
}

impl TokenMinter {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }

    /// Mint a new token for `user`. Not idempotent: every call creates a new token.
    #[tracing::instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn mint(
        &self,
        user: &User,
        scope_request: Option<&str>,
    ) -> Result<TokenResponse, MintError> {
        if let Some(requested) = scope_request.filter(|s| *s != FULL_ACCESS_SCOPE) {
            tracing::debug!(requested, "Requested scope ignored, granting full access");
        }

        let scopes = vec![FULL_ACCESS_SCOPE.to_string()];
        let access_token = self.store.issue_token(user, &scopes).await?;

        Ok(TokenResponse {
            token_type: TOKEN_TYPE.to_string(),
            expires_in: DECLARED_EXPIRES_IN,
            access_token,
            refresh_token: None,
        })
    }
}
