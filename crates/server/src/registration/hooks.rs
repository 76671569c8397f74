//! Side effects run once a new account has been stored.

use crate::oauth2::user::User;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HookError {
    #[error("hook {hook} failed: {reason}")]
    Failed { hook: &'static str, reason: String },
}

/// Invoked in order, after the user row is committed.
///
/// A failing hook is logged by the registration flow; the account stays.
#[async_trait]
pub trait PostRegistrationHook: Send + Sync {
    fn name(&self) -> &'static str;

    async fn on_registered(&self, user: &User) -> Result<(), HookError>;
}

/// Records every registration in the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingRegistrationHook;

#[async_trait]
impl PostRegistrationHook for LoggingRegistrationHook {
    fn name(&self) -> &'static str {
        "logging"
    }

    async fn on_registered(&self, user: &User) -> Result<(), HookError> {
        tracing::info!(user_id = %user.id, email = %user.email, "Registered new user via API");
        Ok(())
    }
}
