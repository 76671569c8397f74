//! SeaORM entities backing the client registry, user store and token store.

pub mod oauth2_client;
pub mod oauth2_token;
pub mod oauth2_user;
