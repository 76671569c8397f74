//! Shared state for the token endpoint.

use crate::oauth2::service::TokenIssuanceService;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

#[derive(Clone)]
pub struct OAuth2State {
    pub service: TokenIssuanceService,
}

impl OAuth2State {
    pub fn new(service: TokenIssuanceService) -> Self {
        Self { service }
    }

    pub fn from_database(db: Arc<DatabaseConnection>, token_lifetime: time::Duration) -> Self {
        Self::new(TokenIssuanceService::with_database(db, token_lifetime))
    }
}
