use thiserror::Error;

/// Failures raised by the collaborator stores (client registry, user store, token store).
///
/// None of these are ever rendered to a client. They surface as `server_error`
/// and are only recorded in the logs.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error("random token generation failed: {0}")]
    Random(String),
    #[error("blocking task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("record already exists: {0}")]
    Duplicate(String),
    #[error("value out of range: {0}")]
    OutOfRange(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Classify a database error, turning unique-constraint violations into `Duplicate`.
    pub fn from_db(err: sea_orm::DbErr) -> Self {
        match err.sql_err() {
            Some(sea_orm::SqlErr::UniqueConstraintViolation(detail)) => StoreError::Duplicate(detail),
            _ => StoreError::Database(err),
        }
    }
}

impl From<argon2::password_hash::Error> for StoreError {
    fn from(err: argon2::password_hash::Error) -> Self {
        StoreError::Hashing(err.to_string())
    }
}

impl From<getrandom::Error> for StoreError {
    fn from(err: getrandom::Error) -> Self {
        StoreError::Random(err.to_string())
    }
}
