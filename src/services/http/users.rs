use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use super::response::{not_found, success, HttpError, Pretty};
use super::{dispatch, AppState};
use crate::models::users::{NewUser, UpdateUser, UserFilter};
use crate::services::users::UserRequest;

pub async fn get_user(
    State(state): State<AppState>,
    user_id: Result<Path<i64>, PathRejection>,
) -> Result<Response, HttpError> {
    let Path(user_id) = user_id?;

    let user = dispatch(&state.user_channel, |response| UserRequest::GetUser {
        user_id,
        response,
    })
    .await?;

    Ok(match user {
        Some(user) => Pretty(StatusCode::OK, user).into_response(),
        None => not_found("Not Found"),
    })
}

pub async fn list_users(
    State(state): State<AppState>,
    filter: Result<Query<UserFilter>, QueryRejection>,
) -> Result<Response, HttpError> {
    let Query(filter) = filter?;

    let page = dispatch(&state.user_channel, |response| UserRequest::ListUsers {
        filter,
        response,
    })
    .await?;

    Ok(Pretty(StatusCode::OK, page).into_response())
}

pub async fn add_user(
    State(state): State<AppState>,
    user: Result<Json<NewUser>, JsonRejection>,
) -> Result<Response, HttpError> {
    let Json(user) = user?;

    let user_id = dispatch(&state.user_channel, |response| UserRequest::AddUser {
        user,
        response,
    })
    .await?;

    Ok(success(format!("Successfully added. User ID: {}", user_id)))
}

pub async fn update_user(
    State(state): State<AppState>,
    user_id: Result<Path<i64>, PathRejection>,
    update: Result<Json<UpdateUser>, JsonRejection>,
) -> Result<Response, HttpError> {
    let Path(user_id) = user_id?;
    let Json(update) = update?;

    let updated = dispatch(&state.user_channel, |response| UserRequest::UpdateUser {
        user_id,
        full_name: update.user_full_name,
        response,
    })
    .await?;

    Ok(if updated {
        success("")
    } else {
        not_found("Not Found")
    })
}

pub async fn delete_user(
    State(state): State<AppState>,
    user_id: Result<Path<i64>, PathRejection>,
) -> Result<Response, HttpError> {
    let Path(user_id) = user_id?;

    let deleted = dispatch(&state.user_channel, |response| UserRequest::DeleteUser {
        user_id,
        response,
    })
    .await?;

    Ok(if deleted {
        success("")
    } else {
        not_found("Not Found")
    })
}
