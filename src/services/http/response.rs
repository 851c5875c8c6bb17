use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::services::ServiceError;

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum Status {
    #[serde(rename = "OK")]
    Ok,
    Error,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct StatusResponse {
    pub status: Status,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

/// JSON body indented with two spaces.
pub struct Pretty<T>(pub StatusCode, pub T);

impl<T: Serialize> IntoResponse for Pretty<T> {
    fn into_response(self) -> Response {
        match serde_json::to_vec_pretty(&self.1) {
            Ok(body) => (
                self.0,
                [(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                )],
                body,
            )
                .into_response(),
            Err(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Could not encode response: {}", e),
            )
                .into_response(),
        }
    }
}

pub fn success(message: impl Into<String>) -> Response {
    Pretty(
        StatusCode::OK,
        StatusResponse {
            status: Status::Ok,
            message: message.into(),
        },
    )
    .into_response()
}

pub fn failure(code: StatusCode, message: impl Into<String>) -> Response {
    Pretty(
        code,
        StatusResponse {
            status: Status::Error,
            message: message.into(),
        },
    )
    .into_response()
}

pub fn not_found(message: &str) -> Response {
    failure(StatusCode::NOT_FOUND, message)
}

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("{1}")]
    Rejected(StatusCode, String),
    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl From<PathRejection> for HttpError {
    fn from(rejection: PathRejection) -> Self {
        HttpError::Rejected(rejection.status(), rejection.body_text())
    }
}

impl From<QueryRejection> for HttpError {
    fn from(rejection: QueryRejection) -> Self {
        HttpError::Rejected(rejection.status(), rejection.body_text())
    }
}

impl From<JsonRejection> for HttpError {
    fn from(rejection: JsonRejection) -> Self {
        HttpError::Rejected(rejection.status(), rejection.body_text())
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let code = match &self {
            HttpError::Rejected(code, _) => *code,
            HttpError::Service(ServiceError::BadRequest(_)) => StatusCode::BAD_REQUEST,
            HttpError::Service(ServiceError::NotFound(_)) => StatusCode::NOT_FOUND,
            HttpError::Service(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if code.is_server_error() {
            log::error!(target: "http", "Request failed: {}", self);
        }

        failure(code, self.to_string())
    }
}
