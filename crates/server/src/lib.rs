//! A password-grant token issuance service.
//!
//! Registered clients exchange a user's email and password for an opaque bearer
//! token. Users can be created through an optional, gated registration endpoint.

use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::config::AppConfig;

pub mod api;
pub mod config;
pub mod entity;
pub mod error;
pub mod oauth2;
pub mod registration;

#[derive(Clone, Debug)]
pub struct AppResources {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
}
