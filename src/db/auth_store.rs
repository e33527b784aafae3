use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Authenticated account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

/// Ownership unit; every user gets a personal group named after its id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authentication database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),

    #[error("User '{0}' already exists")]
    DuplicateUser(String),
}

/// Relational store of users, profiles and groups.
///
/// Creating a user does not create its profile; callers invoke
/// `create_profile` as an explicit follow-up step.
#[async_trait]
pub trait AuthStore: Send + Sync {
    /// The matching active user, or `None` on unknown user or wrong password.
    async fn authenticate(&self, username: &str, password: &str) -> Result<Option<User>, AuthError>;

    async fn create_user(&self, username: &str, password: &str) -> Result<User, AuthError>;

    async fn create_profile(&self, user: &User, bio: &str) -> Result<(), AuthError>;

    async fn get_or_create_group(&self, name: &str) -> Result<Group, AuthError>;

    async fn add_user_to_group(&self, user: &User, group: &Group) -> Result<(), AuthError>;

    /// The group named after `user.id` that `user` belongs to.
    async fn personal_group(&self, user: &User) -> Result<Option<Group>, AuthError>;
}

/// Name of the personal group owned by `user`
pub fn personal_group_name(user: &User) -> String {
    user.id.to_string()
}

/// Argon2 hash of `password`, computed on the blocking pool.
pub async fn hash_password(password: &str) -> Result<String, AuthError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::PasswordHash(e.to_string()))
    })
    .await
    .map_err(|e| AuthError::PasswordHash(e.to_string()))?
}

/// Check `password` against a stored argon2 hash on the blocking pool.
/// Malformed hashes never verify.
pub async fn verify_password(password: &str, stored_hash: &str) -> bool {
    let password = password.to_string();
    let stored_hash = stored_hash.to_string();
    let verified = tokio::task::spawn_blocking(move || match PasswordHash::new(&stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    })
    .await;
    verified.unwrap_or(false)
}
