//! Collaborator stores consumed by the token issuance flow.
//!
//! The flow only talks to these traits; the SeaORM-backed implementations below
//! are what the server wires up. Each method is a single lookup or write with no
//! retries, so a transient failure surfaces to the caller as-is.

use crate::entity::{oauth2_client, oauth2_token, oauth2_user};
use crate::error::StoreError;
use crate::oauth2::client::{Client, secrets_match};
use crate::oauth2::password;
use crate::oauth2::user::User;
use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
};
use std::fmt;
use std::sync::Arc;
use time::OffsetDateTime;

/// Label stored with every token minted by the password grant.
pub const TOKEN_NAME: &str = "API Token";

#[async_trait]
pub trait ClientRegistry: Send + Sync {
    /// Return the client only if the id exists, it is not revoked and the secret matches.
    ///
    /// Implementations must compare secrets with [`secrets_match`].
    async fn find_active_client(
        &self,
        client_id: &str,
        client_secret: &str,
    ) -> Result<Option<Client>, StoreError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Exact lookup by username (email). Case handling is up to the store.
    async fn find_user(&self, username: &str) -> Result<Option<User>, StoreError>;

    /// One-way comparison of `password` against the user's stored hash.
    async fn verify_password(&self, user: &User, password: &str) -> Result<bool, StoreError>;

    async fn create_user(&self, new_user: NewUser) -> Result<User, StoreError>;
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Persist a new token bound to `user` and return its opaque value.
    async fn issue_token(&self, user: &User, scopes: &[String]) -> Result<String, StoreError>;
}

/// A user about to be stored. The password is already hashed.
#[derive(Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
}

impl fmt::Debug for NewUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewUser")
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .finish()
    }
}

impl From<oauth2_user::Model> for User {
    fn from(model: oauth2_user::Model) -> Self {
        Self {
            id: model.id,
            email: model.email,
            password_hash: model.password_hash,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

impl From<oauth2_client::Model> for Client {
    fn from(model: oauth2_client::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            revoked: model.revoked,
        }
    }
}

/// Database-backed client registry.
#[derive(Clone)]
pub struct DbClientRegistry {
    db: Arc<DatabaseConnection>,
}

impl DbClientRegistry {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Register a new client. The generated secret is returned once and only
    /// kept in the registry afterwards.
    #[tracing::instrument(skip(self))]
    pub async fn create_client(&self, name: &str) -> Result<(Client, String), StoreError> {
        let now = OffsetDateTime::now_utc();
        let secret = password::generate_token()?;

        let client = oauth2_client::ActiveModel {
            id: Set(uuid::Uuid::new_v4().to_string()),
            secret: Set(secret.clone()),
            name: Set(name.to_string()),
            revoked: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let model = client
            .insert(self.db.as_ref())
            .await
            .map_err(StoreError::from_db)?;
        tracing::info!(client_id = %model.id, "Client created");
        Ok((Client::from(model), secret))
    }

    /// Mark a client as revoked. Returns `false` if no such client exists.
    #[tracing::instrument(skip(self))]
    pub async fn revoke_client(&self, client_id: &str) -> Result<bool, StoreError> {
        let Some(model) = oauth2_client::Entity::find_by_id(client_id)
            .one(self.db.as_ref())
            .await?
        else {
            return Ok(false);
        };

        let mut active: oauth2_client::ActiveModel = model.into();
        active.revoked = Set(true);
        active.updated_at = Set(OffsetDateTime::now_utc());
        active.update(self.db.as_ref()).await?;

        tracing::info!("Client revoked");
        Ok(true)
    }
}

#[async_trait]
impl ClientRegistry for DbClientRegistry {
    async fn find_active_client(
        &self,
        client_id: &str,
        client_secret: &str,
    ) -> Result<Option<Client>, StoreError> {
        let found = oauth2_client::Entity::find_by_id(client_id)
            .filter(oauth2_client::Column::Revoked.eq(false))
            .one(self.db.as_ref())
            .await?;

        // Compare even when nothing was found so both paths cost the same
        let stored_secret = found.as_ref().map_or("", |c| c.secret.as_str());
        let secret_matches = secrets_match(stored_secret, client_secret);

        Ok(found.filter(|_| secret_matches).map(Client::from))
    }
}

/// Database-backed user store.
#[derive(Clone)]
pub struct DbUserStore {
    db: Arc<DatabaseConnection>,
}

impl DbUserStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for DbUserStore {
    async fn find_user(&self, username: &str) -> Result<Option<User>, StoreError> {
        let user = oauth2_user::Entity::find()
            .filter(oauth2_user::Column::Email.eq(username))
            .one(self.db.as_ref())
            .await?;
        Ok(user.map(User::from))
    }

    async fn verify_password(&self, user: &User, password: &str) -> Result<bool, StoreError> {
        password::verify_password_off_thread(password, &user.password_hash).await
    }

    async fn create_user(&self, new_user: NewUser) -> Result<User, StoreError> {
        let now = OffsetDateTime::now_utc();
        let user = oauth2_user::ActiveModel {
            id: Set(uuid::Uuid::new_v4().to_string()),
            email: Set(new_user.email),
            password_hash: Set(new_user.password_hash),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let model = user
            .insert(self.db.as_ref())
            .await
            .map_err(StoreError::from_db)?;
        Ok(User::from(model))
    }
}

/// Database-backed token store.
///
/// `lifetime` is the store-side validity of a token and is independent of the
/// `expires_in` value announced in the token response.
#[derive(Clone)]
pub struct DbTokenStore {
    db: Arc<DatabaseConnection>,
    lifetime: time::Duration,
}

impl DbTokenStore {
    pub fn new(db: Arc<DatabaseConnection>, lifetime: time::Duration) -> Self {
        Self { db, lifetime }
    }
}

#[async_trait]
impl TokenStore for DbTokenStore {
    async fn issue_token(&self, user: &User, scopes: &[String]) -> Result<String, StoreError> {
        let now = OffsetDateTime::now_utc();
        let expires_at = now.checked_add(self.lifetime).ok_or_else(|| {
            StoreError::OutOfRange(format!("token lifetime {} overflows expires_at", self.lifetime))
        })?;
        let access_token = password::generate_token()?;

        let token = oauth2_token::ActiveModel {
            id: Set(uuid::Uuid::new_v4().to_string()),
            name: Set(TOKEN_NAME.to_string()),
            access_token: Set(access_token.clone()),
            user_id: Set(user.id.clone()),
            scope: Set(scopes.join(" ")),
            created_at: Set(now),
            expires_at: Set(expires_at),
            revoked_at: Set(None),
        };

        token
            .insert(self.db.as_ref())
            .await
            .map_err(StoreError::from_db)?;
        Ok(access_token)
    }
}
