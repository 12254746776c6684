use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use super::password::{generate_salt, hash_password, verify_password};
use crate::dbutil::Pagination;

/// User record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,                            // internal key, never exposed
    pub uid: String,                        // public identifier
    pub email: String,
    pub password: String,                   // PBKDF2 digest, hex
    pub salt: String,
    pub nickname: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub deleted_at: Option<OffsetDateTime>, // soft-delete marker
}

impl User {
    /// Checks `candidate` against the stored digest using this user's salt.
    pub fn validate_password(&self, candidate: &str) -> bool {
        verify_password(&self.password, candidate, &self.salt)
    }
}

/// A user that has been salted and hashed but not yet persisted.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub uid: String,
    pub email: String,
    pub password: String,
    pub salt: String,
    pub nickname: String,
}

impl NewUser {
    /// Generates the uid and salt, then replaces the plaintext with its digest.
    pub fn from_options(options: CreateUserOptions) -> Self {
        let salt = generate_salt();
        let password = hash_password(&options.password, &salt);
        Self {
            uid: new_uid(),
            email: options.email,
            password,
            salt,
            nickname: options.nickname,
        }
    }
}

fn new_uid() -> String {
    Uuid::new_v4().simple().to_string()
}

#[derive(Debug, Clone)]
pub struct CreateUserOptions {
    pub email: String,
    pub password: String,
    pub nickname: String,
}

#[derive(Debug, Clone, Default)]
pub struct ListUsersOptions {
    pub pagination: Pagination,
}

#[derive(Debug, Clone)]
pub struct UpdateUserOptions {
    pub nickname: String,
}
