use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use super::{
    dto::{CreateUserRequest, ListUsersResponse, LoginRequest, PublicUser, UpdateUserRequest},
    extractors::PathUser,
    repo_types::ListUsersOptions,
    UsersError,
};
use crate::{
    dbutil::Pagination,
    extract::{ApiJson, ApiQuery},
    response::{success, ApiError, Envelope},
    state::AppState,
};

type ApiResult<T> = Result<Json<Envelope<T>>, ApiError>;

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/:user_uid",
            get(get_user).put(update_user).delete(delete_user),
        )
}

pub fn auth_routes() -> Router<AppState> {
    Router::new().route("/auth/login", post(login))
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
    ApiQuery(pagination): ApiQuery<Pagination>,
) -> ApiResult<ListUsersResponse> {
    let (users, total) = state
        .users
        .list(ListUsersOptions {
            pagination: pagination.normalize(),
        })
        .await?;

    Ok(success(ListUsersResponse {
        data: users.into_iter().map(PublicUser::from).collect(),
        total,
    }))
}

#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreateUserRequest>,
) -> ApiResult<PublicUser> {
    let options = payload.into_options().map_err(|e| {
        warn!(msg = %e.msg, "invalid create user request");
        e
    })?;

    let user = match state.users.create(options).await {
        Ok(u) => u,
        Err(UsersError::Conflict) => {
            warn!("email already registered");
            return Err(UsersError::Conflict.into());
        }
        Err(e) => return Err(e.into()),
    };

    info!(uid = %user.uid, email = %user.email, "user registered");
    Ok(success(PublicUser::from(user)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> ApiResult<PublicUser> {
    let email = payload.email();
    if email.is_empty() || payload.password.is_empty() {
        return Err(ApiError::bad_request("email and password are required"));
    }

    match state.users.authenticate(&email, &payload.password).await {
        Ok(user) => {
            info!(uid = %user.uid, "user logged in");
            Ok(success(PublicUser::from(user)))
        }
        Err(UsersError::BadCredentials) => {
            warn!(%email, "login rejected");
            Err(UsersError::BadCredentials.into())
        }
        Err(e) => Err(e.into()),
    }
}

#[instrument(skip_all, fields(uid = %user.uid))]
pub async fn get_user(PathUser(user): PathUser) -> ApiResult<PublicUser> {
    Ok(success(PublicUser::from(user)))
}

#[instrument(skip_all, fields(uid = %user.uid))]
pub async fn update_user(
    State(state): State<AppState>,
    PathUser(user): PathUser,
    ApiJson(payload): ApiJson<UpdateUserRequest>,
) -> ApiResult<&'static str> {
    let options = payload.into_options()?;
    state.users.update(user.id, options).await?;
    Ok(success("User updated successfully"))
}

#[instrument(skip_all, fields(uid = %user.uid))]
pub async fn delete_user(
    State(state): State<AppState>,
    PathUser(user): PathUser,
) -> ApiResult<&'static str> {
    state.users.delete(user.id).await?;
    Ok(success("User deleted successfully"))
}
