//! API user registration.
//!
//! A sibling of the token flow: accounts created here can immediately obtain
//! tokens from the password grant.

pub mod endpoints;
pub mod gate;
pub mod hooks;
mod service;

pub use endpoints::{RegistrationState, UserDocument, router};
pub use gate::{ConfigRegistrationGate, RegistrationGate};
pub use hooks::{HookError, LoggingRegistrationHook, PostRegistrationHook};
pub use service::{RegistrationError, RegistrationService};

/// OpenAPI tag for registration endpoints
pub const REGISTRATION_TAG: &str = "Registration";
