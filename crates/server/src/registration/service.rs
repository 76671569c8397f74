//! Account creation through the API.

use crate::error::StoreError;
use crate::oauth2::password;
use crate::oauth2::store::{NewUser, UserStore};
use crate::oauth2::user::User;
use crate::oauth2::validation::{
    EMAIL_TAKEN, RawRegistrationRequest, ValidationErrors, is_valid_email, validate_registration,
};
use crate::registration::gate::RegistrationGate;
use crate::registration::hooks::PostRegistrationHook;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("registration is disabled")]
    Disabled,
    #[error("registration request is invalid")]
    Invalid(ValidationErrors),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for RegistrationError {
    fn into_response(self) -> Response {
        match self {
            RegistrationError::Disabled => (
                StatusCode::FORBIDDEN,
                Json(json!({
                    "message": "Registration is currently not available.",
                    "errors": { "registration": ["Registration is disabled."] }
                })),
            )
                .into_response(),
            RegistrationError::Invalid(errors) => errors.into_response(),
            RegistrationError::Store(e) => {
                tracing::error!(error = %e, "Registration failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "message": "Server Error" })),
                )
                    .into_response()
            }
        }
    }
}

#[derive(Clone)]
pub struct RegistrationService {
    gate: Arc<dyn RegistrationGate>,
    users: Arc<dyn UserStore>,
    hooks: Vec<Arc<dyn PostRegistrationHook>>,
}

impl RegistrationService {
    pub fn new(gate: Arc<dyn RegistrationGate>, users: Arc<dyn UserStore>) -> Self {
        Self {
            gate,
            users,
            hooks: Vec::new(),
        }
    }

    pub fn with_hook(mut self, hook: Arc<dyn PostRegistrationHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Create an account.
    ///
    /// The gate is consulted before the request is even looked at, so a closed
    /// registration never touches the user store.
    #[tracing::instrument(skip_all, fields(email = raw.email.as_deref().unwrap_or("")))]
    pub async fn register(&self, raw: RawRegistrationRequest) -> Result<User, RegistrationError> {
        if !self.gate.is_registration_enabled().await? {
            tracing::info!("Registration attempt while registration is disabled");
            return Err(RegistrationError::Disabled);
        }

        let email_taken = match raw.email.as_deref().map(str::trim) {
            Some(email) if is_valid_email(email) => self.users.find_user(email).await?.is_some(),
            _ => false,
        };
        let request = validate_registration(raw, email_taken).map_err(RegistrationError::Invalid)?;

        let password_hash = password::hash_password_off_thread(&request.password).await?;
        let user = match self
            .users
            .create_user(NewUser {
                email: request.email,
                password_hash,
            })
            .await
        {
            Ok(user) => user,
            // Lost a race with a concurrent registration of the same address.
            Err(StoreError::Duplicate(_)) => {
                return Err(RegistrationError::Invalid(ValidationErrors::single(
                    "email",
                    EMAIL_TAKEN,
                )));
            }
            Err(e) => return Err(e.into()),
        };

        for hook in &self.hooks {
            if let Err(e) = hook.on_registered(&user).await {
                tracing::warn!(hook = hook.name(), user_id = %user.id, error = %e, "Post-registration hook failed");
            }
        }

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth2::store::mock::{MockUserStore, StoreBehaviour};
    use crate::registration::hooks::HookError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedGate(bool);

    #[async_trait]
    impl RegistrationGate for FixedGate {
        async fn is_registration_enabled(&self) -> Result<bool, StoreError> {
            Ok(self.0)
        }
    }

    #[derive(Default)]
    struct CountingHook {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl PostRegistrationHook for CountingHook {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn on_registered(&self, _user: &User) -> Result<(), HookError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(HookError::Failed {
                    hook: "counting",
                    reason: "mailer offline".into(),
                });
            }
            Ok(())
        }
    }

    fn request(email: &str, password: &str) -> RawRegistrationRequest {
        RawRegistrationRequest {
            email: Some(email.into()),
            password: Some(password.into()),
            password_confirmation: Some(password.into()),
        }
    }

    #[tokio::test]
    async fn test_register_creates_user_and_runs_hooks() {
        let users = Arc::new(MockUserStore::empty());
        let hook = Arc::new(CountingHook::default());
        let service = RegistrationService::new(Arc::new(FixedGate(true)), users.clone())
            .with_hook(hook.clone());

        let user = service
            .register(request("new@example.com", "correct horse"))
            .await
            .unwrap();

        assert_eq!(user.email, "new@example.com");
        assert_ne!(user.password_hash, "correct horse");
        assert!(password::verify_password("correct horse", &user.password_hash));
        assert!(users.user("new@example.com").is_some());
        assert_eq!(hook.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_closed_gate_touches_nothing() {
        let users = Arc::new(MockUserStore::empty());
        let hook = Arc::new(CountingHook::default());
        let service = RegistrationService::new(Arc::new(FixedGate(false)), users.clone())
            .with_hook(hook.clone());

        // Even an invalid request gets the disabled answer.
        let err = service
            .register(RawRegistrationRequest::default())
            .await
            .unwrap_err();

        assert!(matches!(err, RegistrationError::Disabled));
        assert_eq!(users.total_calls(), 0);
        assert_eq!(hook.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let users = Arc::new(MockUserStore::with_user("a@example.com", "hunter22"));
        let service = RegistrationService::new(Arc::new(FixedGate(true)), users.clone());

        let err = service
            .register(request("a@example.com", "another-password"))
            .await
            .unwrap_err();

        let RegistrationError::Invalid(errors) = err else {
            panic!("expected validation failure");
        };
        assert_eq!(errors.errors["email"], vec![EMAIL_TAKEN]);
        assert_eq!(users.create_calls(), 0);
    }

    #[tokio::test]
    async fn test_invalid_request_not_stored() {
        let users = Arc::new(MockUserStore::empty());
        let service = RegistrationService::new(Arc::new(FixedGate(true)), users.clone());

        let err = service
            .register(request("new@example.com", "short"))
            .await
            .unwrap_err();

        assert!(matches!(err, RegistrationError::Invalid(_)));
        assert_eq!(users.create_calls(), 0);
    }

    #[tokio::test]
    async fn test_failing_hook_keeps_account() {
        let users = Arc::new(MockUserStore::empty());
        let hook = Arc::new(CountingHook {
            fail: true,
            ..Default::default()
        });
        let service = RegistrationService::new(Arc::new(FixedGate(true)), users.clone())
            .with_hook(hook.clone());

        let user = service
            .register(request("new@example.com", "correct horse"))
            .await
            .unwrap();

        assert_eq!(hook.calls.load(Ordering::SeqCst), 1);
        assert_eq!(users.user("new@example.com"), Some(user));
    }

    #[tokio::test]
    async fn test_store_failure_is_internal() {
        let users = Arc::new(MockUserStore::empty().behaving(StoreBehaviour::Fail));
        let service = RegistrationService::new(Arc::new(FixedGate(true)), users);

        let err = service
            .register(request("new@example.com", "correct horse"))
            .await
            .unwrap_err();

        assert!(matches!(err, RegistrationError::Store(_)));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
