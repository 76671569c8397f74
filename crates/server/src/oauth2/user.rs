//! User authentication.
//!
//! "No such user" and "wrong password" are kept apart internally so operators can
//! tell them apart in the logs, but both become the same `invalid_grant` answer.

use crate::error::StoreError;
use crate::oauth2::password;
use crate::oauth2::store::UserStore;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use time::OffsetDateTime;

/// Read-only view of a user record.
#[derive(Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub email: String,
    /// PHC string with the algorithm parameters embedded
    pub password_hash: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UserRejection {
    UnknownUser,
    PasswordMismatch,
}

impl fmt::Display for UserRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRejection::UnknownUser => f.write_str("user not found"),
            UserRejection::PasswordMismatch => f.write_str("password mismatch"),
        }
    }
}

#[derive(Debug, Error)]
pub enum UserAuthError {
    #[error("user authentication failed: {0}")]
    Rejected(UserRejection),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone)]
pub struct UserAuthenticator {
    store: Arc<dyn UserStore>,
}

impl UserAuthenticator {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self, password))]
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User, UserAuthError> {
        let Some(user) = self.store.find_user(username).await? else {
            password::burn_verification(password).await;
            return Err(UserAuthError::Rejected(UserRejection::UnknownUser));
        };

        if !self.store.verify_password(&user, password).await? {
            return Err(UserAuthError::Rejected(UserRejection::PasswordMismatch));
        }

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth2::store::mock::{MockUserStore, StoreBehaviour};

    #[tokio::test]
    async fn test_correct_password_authenticates() {
        let store = Arc::new(MockUserStore::with_user("a@example.com", "hunter22"));
        let authenticator = UserAuthenticator::new(store.clone());

        let user = authenticator
            .authenticate("a@example.com", "hunter22")
            .await
            .unwrap();
        assert_eq!(user.email, "a@example.com");
        assert_eq!(store.find_calls(), 1);
        assert_eq!(store.verify_calls(), 1);
    }

    #[tokio::test]
    async fn test_wrong_password_is_mismatch() {
        let store = Arc::new(MockUserStore::with_user("a@example.com", "hunter22"));
        let authenticator = UserAuthenticator::new(store);

        let err = authenticator
            .authenticate("a@example.com", "hunter23")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            UserAuthError::Rejected(UserRejection::PasswordMismatch)
        ));
    }

    #[tokio::test]
    async fn test_unknown_user_skips_store_verification() {
        let store = Arc::new(MockUserStore::with_user("a@example.com", "hunter22"));
        let authenticator = UserAuthenticator::new(store.clone());

        let err = authenticator
            .authenticate("nobody@example.com", "hunter22")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            UserAuthError::Rejected(UserRejection::UnknownUser)
        ));
        assert_eq!(store.verify_calls(), 0);
    }

    #[tokio::test]
    async fn test_lookup_is_exact() {
        let store = Arc::new(MockUserStore::with_user("a@example.com", "hunter22"));
        let authenticator = UserAuthenticator::new(store);

        let err = authenticator
            .authenticate("A@example.com", "hunter22")
            .await
            .unwrap_err();
        assert!(matches!(err, UserAuthError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let store = Arc::new(
            MockUserStore::with_user("a@example.com", "hunter22").behaving(StoreBehaviour::Fail),
        );
        let authenticator = UserAuthenticator::new(store);

        let err = authenticator
            .authenticate("a@example.com", "hunter22")
            .await
            .unwrap_err();
        assert!(matches!(err, UserAuthError::Store(_)));
    }

    #[test]
    fn test_debug_redacts_hash() {
        let store = MockUserStore::with_user("a@example.com", "hunter22");
        let user = store.user("a@example.com").unwrap();
        let debug = format!("{user:?}");
        assert!(!debug.contains(&user.password_hash));
        assert!(debug.contains("a@example.com"));
    }
}
