use crate::oauth2::minter::DECLARED_EXPIRES_IN;
use serde::Deserialize;
use thiserror::Error;

/// Upper bound on `oauth2.personal_token_lifetime_days`, roughly one century.
pub const MAX_TOKEN_LIFETIME_DAYS: i64 = 36_500;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration build error: {0}")]
    Build(#[from] config::ConfigError),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

#[derive(Clone, Debug, Deserialize)]
pub struct OAuth2Config {
    /// Store-side validity of a minted token, in days.
    #[serde(default = "default_personal_token_lifetime_days")]
    pub personal_token_lifetime_days: i64,
}

impl Default for OAuth2Config {
    fn default() -> Self {
        Self {
            personal_token_lifetime_days: default_personal_token_lifetime_days(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct RegistrationConfig {
    #[serde(default = "default_allow_registration")]
    pub allow_registration: bool,
    /// `web` when accounts are managed by this service. Any other value means an
    /// external identity provider owns them and registration is closed.
    #[serde(default = "default_authentication_guard")]
    pub authentication_guard: String,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            allow_registration: default_allow_registration(),
            authentication_guard: default_authentication_guard(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Public URL of this service, used for links in responses.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub oauth2: OAuth2Config,
    #[serde(default)]
    pub registration: RegistrationConfig,
}

impl AppConfig {
    /// Store-side lifetime of issued tokens.
    pub fn token_lifetime(&self) -> time::Duration {
        time::Duration::days(self.oauth2.personal_token_lifetime_days)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database_url.trim().is_empty() {
            return Err(ConfigError::Validation("database_url must not be empty".into()));
        }
        if self.bind_address.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::Validation(format!(
                "bind_address must be a socket address like 0.0.0.0:8080, got {:?}",
                self.bind_address
            )));
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::Validation(
                "base_url must start with http:// or https://".into(),
            ));
        }
        let lifetime_days = self.oauth2.personal_token_lifetime_days;
        if !(1..=MAX_TOKEN_LIFETIME_DAYS).contains(&lifetime_days) {
            return Err(ConfigError::Validation(format!(
                "oauth2.personal_token_lifetime_days must be between 1 and {MAX_TOKEN_LIFETIME_DAYS}, got {lifetime_days}"
            )));
        }
        if self.registration.authentication_guard.trim().is_empty() {
            return Err(ConfigError::Validation(
                "registration.authentication_guard must not be empty".into(),
            ));
        }
        Ok(())
    }

    fn warn_on_lifetime_mismatch(&self) {
        let store_seconds = self.token_lifetime().whole_seconds();
        if store_seconds != DECLARED_EXPIRES_IN {
            tracing::warn!(
                store_lifetime_seconds = store_seconds,
                declared_expires_in = DECLARED_EXPIRES_IN,
                "Token responses announce a lifetime that differs from how long tokens stay valid in the store"
            );
        }
    }
}

fn default_personal_token_lifetime_days() -> i64 {
    365
}

fn default_allow_registration() -> bool {
    true
}

fn default_authentication_guard() -> String {
    "web".to_string()
}

fn default_bind_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

/// Load application configuration from `config.yaml` + environment overrides.
///
/// Any environment variable matching the key path separated by double
/// underscores (e.g. `REGISTRATION__ALLOW_REGISTRATION`) overrides the file value.
/// The file itself is optional when everything comes from the environment.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    use config::{Config, Environment, File};
    let cfg = Config::builder()
        .add_source(File::with_name("config.yaml").required(false))
        .add_source(Environment::default().separator("__"))
        .build()?;

    finish(cfg.try_deserialize()?)
}

/// Parse configuration from a YAML document, without environment overrides.
pub fn load_config_from_str(yaml: &str) -> Result<AppConfig, ConfigError> {
    use config::{Config, File, FileFormat};
    let cfg = Config::builder()
        .add_source(File::from_str(yaml, FileFormat::Yaml))
        .build()?;

    finish(cfg.try_deserialize()?)
}

fn finish(app: AppConfig) -> Result<AppConfig, ConfigError> {
    app.validate()?;
    app.warn_on_lifetime_mismatch();
    Ok(app)
}
