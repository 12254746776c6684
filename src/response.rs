use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error};

use crate::users::UsersError;

/// Success body: `{"data": ...}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub data: T,
}

pub fn success<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope { data })
}

/// Error body: `{"error": <status>, "msg": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub msg: String,
}

impl ApiError {
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            msg: msg.into(),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": self.status.as_u16(),
            "msg": self.msg,
        });
        (self.status, Json(body)).into_response()
    }
}

impl From<UsersError> for ApiError {
    fn from(e: UsersError) -> Self {
        match e {
            UsersError::BadCredentials => {
                Self::new(StatusCode::UNAUTHORIZED, "Invalid email or password")
            }
            UsersError::NotFound => Self::new(StatusCode::NOT_FOUND, "User does not exist"),
            UsersError::Conflict => Self::new(StatusCode::CONFLICT, "Email already registered"),
            UsersError::Store(e) => {
                error!(error = ?e, "users store failed");
                Self::internal()
            }
        }
    }
}

// Extractor rejections keep axum's status and text, inside our error body.
macro_rules! from_rejection {
    ($($rejection:ty),+) => {
        $(
            impl From<$rejection> for ApiError {
                fn from(rejection: $rejection) -> Self {
                    debug!(reason = %rejection.body_text(), "request rejected");
                    Self::new(rejection.status(), rejection.body_text())
                }
            }
        )+
    };
}

from_rejection!(JsonRejection, QueryRejection, PathRejection);
