//! Client authentication.
//!
//! A client authenticates only when its id, its secret and its non-revoked status
//! all match at once. Every way of failing produces the same `invalid_client`
//! answer; the reason is kept for the logs only.

use crate::error::StoreError;
use crate::oauth2::store::ClientRegistry;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Read-only view of a registered client. The secret never leaves the registry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Client {
    pub id: String,
    pub name: String,
    pub revoked: bool,
}

/// Why a client was turned away. Never exposed in a response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientRejection {
    /// Unknown id, wrong secret, or a client the registry considers inactive
    NoMatch,
    /// The registry handed back a client flagged as revoked
    Revoked,
}

impl fmt::Display for ClientRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientRejection::NoMatch => f.write_str("no active client matches the credentials"),
            ClientRejection::Revoked => f.write_str("client is revoked"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ClientAuthError {
    #[error("client authentication failed: {0}")]
    InvalidClient(ClientRejection),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Compare a stored secret against a presented one in constant time.
///
/// Both sides are hashed first so the comparison always runs over 32 bytes and
/// leaks neither content nor length.
pub fn secrets_match(stored: &str, presented: &str) -> bool {
    let stored = Sha256::digest(stored.as_bytes());
    let presented = Sha256::digest(presented.as_bytes());
    stored.as_slice().ct_eq(presented.as_slice()).into()
}

#[derive(Clone)]
pub struct ClientAuthenticator {
    registry: Arc<dyn ClientRegistry>,
}

impl ClientAuthenticator {
    pub fn new(registry: Arc<dyn ClientRegistry>) -> Self {
        Self { registry }
    }

    #[tracing::instrument(skip(self, client_secret))]
    pub async fn authenticate(
        &self,
        client_id: &str,
        client_secret: &str,
    ) -> Result<Client, ClientAuthError> {
        let client = self
            .registry
            .find_active_client(client_id, client_secret)
            .await?
            .ok_or(ClientAuthError::InvalidClient(ClientRejection::NoMatch))?;

        if client.revoked {
            return Err(ClientAuthError::InvalidClient(ClientRejection::Revoked));
        }

        Ok(client)
    }
}
