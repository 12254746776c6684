use async_trait::async_trait;

use super::password::burn_verification;
use super::repo_types::{CreateUserOptions, ListUsersOptions, UpdateUserOptions, User};

/// Name of the partial unique index guarding live emails.
pub const EMAIL_UNIQUE_CONSTRAINT: &str = "users_email_active_key";

#[derive(Debug, thiserror::Error)]
pub enum UsersError {
    /// Unknown email or wrong password. The two causes are not distinguished.
    #[error("invalid email or password")]
    BadCredentials,
    #[error("user does not exist")]
    NotFound,
    #[error("email already registered")]
    Conflict,
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub type UsersResult<T> = Result<T, UsersError>;

/// Persistent interface for users. Soft-deleted rows are invisible to every method.
#[async_trait]
pub trait UsersStore: Send + Sync {
    /// Returns the user when `email` exists and `password` matches, `BadCredentials` otherwise.
    async fn authenticate(&self, email: &str, password: &str) -> UsersResult<User>;

    /// Salts, hashes and inserts a new user. `Conflict` when the email is taken.
    async fn create(&self, options: CreateUserOptions) -> UsersResult<User>;

    /// A page of users, newest first, together with the total number of users.
    async fn list(&self, options: ListUsersOptions) -> UsersResult<(Vec<User>, i64)>;

    async fn get_by_id(&self, id: i64) -> UsersResult<User>;

    async fn get_by_uid(&self, uid: &str) -> UsersResult<User>;

    /// Changes the nickname only. Succeeds without effect when `id` matches nothing;
    /// callers resolve the user first.
    async fn update(&self, id: i64, options: UpdateUserOptions) -> UsersResult<()>;

    /// Soft delete. Deleting a missing or already deleted user is not an error.
    async fn delete(&self, id: i64) -> UsersResult<()>;
}

/// Turns an email lookup into an authentication result.
pub(crate) fn check_credentials(found: Option<User>, password: &str) -> UsersResult<User> {
    match found {
        Some(user) if user.validate_password(password) => Ok(user),
        Some(_) => Err(UsersError::BadCredentials),
        None => {
            burn_verification(password);
            Err(UsersError::BadCredentials)
        }
    }
}
