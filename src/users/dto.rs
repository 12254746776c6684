use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::repo_types::{CreateUserOptions, UpdateUserOptions, User};
use crate::response::ApiError;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn required(value: &str, field: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::bad_request(format!("{field} is required")));
    }
    Ok(())
}

/// Request body for user creation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub nick_name: String,
}

impl CreateUserRequest {
    pub fn into_options(self) -> Result<CreateUserOptions, ApiError> {
        let email = normalize_email(&self.email);
        required(&email, "email")?;
        if !is_valid_email(&email) {
            return Err(ApiError::bad_request("Invalid email"));
        }
        required(&self.password, "password")?;
        required(&self.nick_name, "nickName")?;
        Ok(CreateUserOptions {
            email,
            password: self.password,
            nickname: self.nick_name.trim().to_string(),
        })
    }
}

/// Request body for nickname changes.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub nick_name: String,
}

impl UpdateUserRequest {
    pub fn into_options(self) -> Result<UpdateUserOptions, ApiError> {
        required(&self.nick_name, "nickName")?;
        Ok(UpdateUserOptions {
            nickname: self.nick_name.trim().to_string(),
        })
    }
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl LoginRequest {
    /// Email normalized the same way as on creation.
    pub fn email(&self) -> String {
        normalize_email(&self.email)
    }
}

/// Public part of the user returned to the client.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub uid: String,
    pub email: String,
    pub nick_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(u: User) -> Self {
        Self {
            uid: u.uid,
            email: u.email,
            nick_name: u.nickname,
            created_at: u.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListUsersResponse {
    pub data: Vec<PublicUser>,
    pub total: i64,
}
