use axum::{
    async_trait,
    extract::{FromRequestParts, Path},
    http::request::Parts,
};
use tracing::debug;

use super::{repo_types::User, UsersError};
use crate::{response::ApiError, state::AppState};

/// Resolves the `:user_uid` path segment to a live user, or rejects with 404.
pub struct PathUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for PathUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Path(uid) = Path::<String>::from_request_parts(parts, state).await?;

        match state.users.get_by_uid(&uid).await {
            Ok(user) => Ok(PathUser(user)),
            Err(UsersError::NotFound) => {
                debug!(%uid, "user not found");
                Err(UsersError::NotFound.into())
            }
            Err(e) => Err(e.into()),
        }
    }
}
