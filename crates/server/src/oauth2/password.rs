//! Password hashing, verification and token generation.
//!
//! Uses Argon2id. Hashing and verification are intentionally slow, so the async
//! helpers move them onto the blocking pool instead of stalling the runtime.

use crate::error::StoreError;
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use once_cell::sync::Lazy;

/// Hash verified against when the user does not exist, so both paths cost the same.
static TIMING_EQUALIZER_HASH: Lazy<Option<String>> =
    Lazy::new(|| hash_password("timing-equalizer-placeholder").ok());

/// Hash a password using Argon2id.
///
/// Returns the PHC-formatted hash string suitable for storage.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a stored hash.
///
/// Returns true if the password matches. Malformed hashes never match.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// [`hash_password`] on the blocking pool.
pub async fn hash_password_off_thread(password: &str) -> Result<String, StoreError> {
    let password = password.to_owned();
    let hash = tokio::task::spawn_blocking(move || hash_password(&password)).await??;
    Ok(hash)
}

/// [`verify_password`] on the blocking pool.
pub async fn verify_password_off_thread(password: &str, hash: &str) -> Result<bool, StoreError> {
    let password = password.to_owned();
    let hash = hash.to_owned();
    Ok(tokio::task::spawn_blocking(move || verify_password(&password, &hash)).await?)
}

/// Spend the same effort as a real verification without a stored hash to check.
pub async fn burn_verification(password: &str) {
    let password = password.to_owned();
    let result = tokio::task::spawn_blocking(move || {
        if let Some(hash) = TIMING_EQUALIZER_HASH.as_deref() {
            let _ = verify_password(&password, hash);
        }
    })
    .await;
    if let Err(e) = result {
        tracing::warn!(error = %e, "Timing equalizer verification task failed");
    }
}

/// Generate an opaque, unguessable access token.
///
/// Returns a URL-safe base64-encoded string of 32 random bytes.
pub fn generate_token() -> Result<String, getrandom::Error> {
    use base64::Engine;
    let mut bytes = [0u8; 32];
    getrandom::fill(&mut bytes)?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}
