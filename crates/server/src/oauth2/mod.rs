//! Password-grant token issuance.
//!
//! ## Flow
//!
//! 1. Field validation of the raw request ([`validation`])
//! 2. Grant validation ([`grant`])
//! 3. Client authentication ([`client`])
//! 4. User authentication ([`user`])
//! 5. Token minting ([`minter`])
//!
//! ## Endpoints
//!
//! - `POST /api/v1/oauth/token` - Token endpoint

pub mod client;
pub mod endpoints;
pub mod error;
pub mod grant;
pub mod minter;
pub mod password;
pub mod service;
mod state;
pub mod store;
pub mod user;
pub mod validation;

pub use endpoints::router;
pub use error::{ErrorResponse, TokenError};
pub use grant::{GrantType, TokenRequest};
pub use minter::TokenResponse;
pub use password::{hash_password, verify_password};
pub use service::TokenIssuanceService;
pub use state::OAuth2State;

/// OpenAPI tag for OAuth2 endpoints
pub const OAUTH2_TAG: &str = "OAuth2";
