//! Decides whether new accounts may be created through the API.

use crate::config::RegistrationConfig;
use crate::error::StoreError;
use async_trait::async_trait;

/// Guard value under which this service manages its own accounts.
pub const LOCAL_AUTHENTICATION_GUARD: &str = "web";

#[async_trait]
pub trait RegistrationGate: Send + Sync {
    async fn is_registration_enabled(&self) -> Result<bool, StoreError>;
}

/// Gate driven by the `registration` section of the configuration.
///
/// Registration is only possible while accounts are managed locally; with an
/// external identity provider in front the API never creates users.
#[derive(Debug, Clone)]
pub struct ConfigRegistrationGate {
    allow_registration: bool,
    authentication_guard: String,
}

impl ConfigRegistrationGate {
    pub fn new(config: &RegistrationConfig) -> Self {
        Self {
            allow_registration: config.allow_registration,
            authentication_guard: config.authentication_guard.clone(),
        }
    }
}

#[async_trait]
impl RegistrationGate for ConfigRegistrationGate {
    async fn is_registration_enabled(&self) -> Result<bool, StoreError> {
        if self.authentication_guard != LOCAL_AUTHENTICATION_GUARD {
            tracing::debug!(guard = %self.authentication_guard, "Registration closed by external authentication guard");
            return Ok(false);
        }
        Ok(self.allow_registration)
    }
}
