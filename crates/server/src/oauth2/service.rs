//! The token issuance service.
//!
//! Runs grant validation, client authentication, user authentication and token
//! minting in that order. The first failure ends the request; later stages never
//! run. Holds no mutable state of its own, so one instance is shared by all
//! concurrent requests.

use crate::oauth2::client::ClientAuthenticator;
use crate::oauth2::error::TokenError;
use crate::oauth2::grant::{self, TokenRequest};
use crate::oauth2::minter::{TokenMinter, TokenResponse};
use crate::oauth2::store::{
    ClientRegistry, DbClientRegistry, DbTokenStore, DbUserStore, TokenStore, UserStore,
};
use crate::oauth2::user::UserAuthenticator;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

#[derive(Clone)]
pub struct TokenIssuanceService {
    clients: ClientAuthenticator,
    users: UserAuthenticator,
    minter: TokenMinter,
}

impl TokenIssuanceService {
    pub fn new(
        registry: Arc<dyn ClientRegistry>,
        users: Arc<dyn UserStore>,
        tokens: Arc<dyn TokenStore>,
    ) -> Self {
        Self {
            clients: ClientAuthenticator::new(registry),
            users: UserAuthenticator::new(users),
            minter: TokenMinter::new(tokens),
        }
    }

    /// Wire the service to the SeaORM-backed stores.
    pub fn with_database(db: Arc<DatabaseConnection>, token_lifetime: time::Duration) -> Self {
        Self::new(
            Arc::new(DbClientRegistry::new(db.clone())),
            Arc::new(DbUserStore::new(db.clone())),
            Arc::new(DbTokenStore::new(db, token_lifetime)),
        )
    }

    #[tracing::instrument(
        skip_all,
        fields(grant_type = %request.grant_type, client_id = request.client_id.as_deref().unwrap_or(""))
    )]
    pub async fn issue(&self, request: TokenRequest) -> Result<TokenResponse, TokenError> {
        let result = self.run(request).await;
        if let Err(e) = &result {
            e.log();
        }
        result
    }

    async fn run(&self, request: TokenRequest) -> Result<TokenResponse, TokenError> {
        let grant = grant::validate(request)?;

        let client = self
            .clients
            .authenticate(&grant.client_id, &grant.client_secret)
            .await?;

        let user = self
            .users
            .authenticate(&grant.username, &grant.password)
            .await?;

        let response = self.minter.mint(&user, grant.scope.as_deref()).await?;

        tracing::info!(client_id = %client.id, user_id = %user.id, "Access token issued");
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oauth2::client::ClientRejection;
    use crate::oauth2::error::Stage;
    use crate::oauth2::grant::{GrantError, GrantType};
    use crate::oauth2::store::mock::{
        FAILURE_DETAIL, MockClientRegistry, MockTokenStore, MockUserStore, StoreBehaviour,
    };
    use crate::oauth2::user::UserRejection;

    struct Fixture {
        registry: Arc<MockClientRegistry>,
        users: Arc<MockUserStore>,
        tokens: Arc<MockTokenStore>,
        service: TokenIssuanceService,
    }

    fn fixture_with(registry: MockClientRegistry, users: MockUserStore) -> Fixture {
        let registry = Arc::new(registry);
        let users = Arc::new(users);
        let tokens = Arc::new(MockTokenStore::new());
        let service = TokenIssuanceService::new(registry.clone(), users.clone(), tokens.clone());
        Fixture {
            registry,
            users,
            tokens,
            service,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(
            MockClientRegistry::with_client("C1", "S1", false),
            MockUserStore::with_user("a@example.com", "hunter22"),
        )
    }

    #[tokio::test]
    async fn test_scenario_a_successful_password_grant() {
        let f = fixture();

        let response = f
            .service
            .issue(TokenRequest::password("C1", "S1", "a@example.com", "hunter22"))
            .await
            .expect("token issued");

        assert_eq!(response.token_type, "Bearer");
        assert_eq!(response.expires_in, 3600);
        assert!(response.refresh_token.is_none());
        assert!(!response.access_token.is_empty());

        let issued = f.tokens.issued();
        assert_eq!(issued.len(), 1);
        assert_eq!(
            Some(issued[0].user_id.clone()),
            f.users.user("a@example.com").map(|u| u.id)
        );
    }

    #[tokio::test]
    async fn test_scenario_b_wrong_password() {
        let f = fixture();

        let err = f
            .service
            .issue(TokenRequest::password("C1", "S1", "a@example.com", "wrong"))
            .await
            .unwrap_err();

        assert!(matches!(err, TokenError::User(UserRejection::PasswordMismatch)));
        assert_eq!(err.status().as_u16(), 401);
        assert_eq!(err.body().error, "invalid_grant");
        assert_eq!(f.tokens.calls(), 0);
    }

    #[tokio::test]
    async fn test_scenario_c_wrong_client_secret() {
        let f = fixture();

        let err = f
            .service
            .issue(TokenRequest::password("C1", "WRONG", "a@example.com", "hunter22"))
            .await
            .unwrap_err();

        assert!(matches!(err, TokenError::Client(ClientRejection::NoMatch)));
        assert_eq!(err.status().as_u16(), 401);
        assert_eq!(err.body().error, "invalid_client");
        // User stage never ran
        assert_eq!(f.users.total_calls(), 0);
        assert_eq!(f.tokens.calls(), 0);
    }

    #[tokio::test]
    async fn test_scenario_d_unsupported_grant_performs_no_lookups() {
        let f = fixture();

        for grant_type in [GrantType::ClientCredentials, GrantType::RefreshToken] {
            let mut request = TokenRequest::password("C1", "S1", "a@example.com", "hunter22");
            request.grant_type = grant_type;

            let err = f.service.issue(request).await.unwrap_err();
            assert!(matches!(
                err,
                TokenError::Request(GrantError::UnsupportedGrantType(_))
            ));
            assert_eq!(err.status().as_u16(), 400);
            assert_eq!(err.body().error, "unsupported_grant_type");
        }

        assert_eq!(f.registry.calls(), 0);
        assert_eq!(f.users.total_calls(), 0);
        assert_eq!(f.tokens.calls(), 0);
    }

    #[tokio::test]
    async fn test_scenario_e_user_store_failure() {
        let f = fixture_with(
            MockClientRegistry::with_client("C1", "S1", false),
            MockUserStore::with_user("a@example.com", "hunter22").behaving(StoreBehaviour::Fail),
        );

        let err = f
            .service
            .issue(TokenRequest::password("C1", "S1", "a@example.com", "hunter22"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            TokenError::Internal {
                stage: Stage::UserAuthentication,
                ..
            }
        ));
        assert_eq!(err.status().as_u16(), 500);
        let body = serde_json::to_string(&err.body()).unwrap();
        assert!(body.contains("server_error"));
        assert!(!body.contains(FAILURE_DETAIL));
        assert!(!body.contains("db-secret"));
    }

    #[tokio::test]
    async fn test_revoked_client_with_exact_credentials() {
        let f = fixture_with(
            MockClientRegistry::with_client("C1", "S1", true),
            MockUserStore::with_user("a@example.com", "hunter22"),
        );

        let err = f
            .service
            .issue(TokenRequest::password("C1", "S1", "a@example.com", "hunter22"))
            .await
            .unwrap_err();

        assert_eq!(err.status().as_u16(), 401);
        assert_eq!(err.body().error, "invalid_client");
        assert_eq!(f.users.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_unknown_user_matches_wrong_password_response() {
        let f = fixture();

        let unknown = f
            .service
            .issue(TokenRequest::password("C1", "S1", "nobody@example.com", "hunter22"))
            .await
            .unwrap_err();
        let wrong = f
            .service
            .issue(TokenRequest::password("C1", "S1", "a@example.com", "nope"))
            .await
            .unwrap_err();

        assert_eq!(unknown.status(), wrong.status());
        assert_eq!(
            serde_json::to_vec(&unknown.body()).unwrap(),
            serde_json::to_vec(&wrong.body()).unwrap()
        );
    }

    #[tokio::test]
    async fn test_repeated_calls_mint_distinct_tokens() {
        let f = fixture();
        let request = TokenRequest::password("C1", "S1", "a@example.com", "hunter22");

        let first = f.service.issue(request.clone()).await.unwrap();
        let second = f.service.issue(request).await.unwrap();

        assert_ne!(first.access_token, second.access_token);
        assert_eq!(f.tokens.calls(), 2);
    }

    #[tokio::test]
    async fn test_requested_scope_is_ignored() {
        let f = fixture();
        let mut request = TokenRequest::password("C1", "S1", "a@example.com", "hunter22");
        request.scope = Some("read-only".into());

        f.service.issue(request).await.unwrap();

        assert_eq!(f.tokens.issued()[0].scopes, vec!["*".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_client_secret_before_lookup() {
        let f = fixture();
        let mut request = TokenRequest::password("C1", "S1", "a@example.com", "hunter22");
        request.client_secret = None;

        let err = f.service.issue(request).await.unwrap_err();

        assert_eq!(err.status().as_u16(), 400);
        assert_eq!(err.body().error, "invalid_request");
        assert_eq!(f.registry.calls(), 0);
    }

    #[tokio::test]
    async fn test_token_store_failure_is_server_error() {
        let registry = Arc::new(MockClientRegistry::with_client("C1", "S1", false));
        let users = Arc::new(MockUserStore::with_user("a@example.com", "hunter22"));
        let tokens = Arc::new(MockTokenStore::new().behaving(StoreBehaviour::Fail));
        let service = TokenIssuanceService::new(registry, users, tokens);

        let err = service
            .issue(TokenRequest::password("C1", "S1", "a@example.com", "hunter22"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            TokenError::Internal {
                stage: Stage::TokenMinting,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_service() {
        let f = fixture();
        let service = f.service.clone();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let service = service.clone();
                tokio::spawn(async move {
                    service
                        .issue(TokenRequest::password("C1", "S1", "a@example.com", "hunter22"))
                        .await
                })
            })
            .collect();

        let mut tokens = Vec::new();
        for handle in handles {
            tokens.push(handle.await.unwrap().unwrap().access_token);
        }
        tokens.sort();
        tokens.dedup();
        assert_eq!(tokens.len(), 4);
    }
}
