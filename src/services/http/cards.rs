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
use crate::models::cards::{CardFilter, NewCard, Refill, Transfer, UpdateCard};
use crate::services::cards::CardRequest;

pub async fn get_card(
    State(state): State<AppState>,
    card_id: Result<Path<i64>, PathRejection>,
) -> Result<Response, HttpError> {
    let Path(card_id) = card_id?;

    let card = dispatch(&state.card_channel, |response| CardRequest::GetCard {
        card_id,
        response,
    })
    .await?;

    Ok(match card {
        Some(card) => Pretty(StatusCode::OK, card).into_response(),
        None => not_found("Not Found"),
    })
}

pub async fn list_cards(
    State(state): State<AppState>,
    filter: Result<Query<CardFilter>, QueryRejection>,
) -> Result<Response, HttpError> {
    let Query(filter) = filter?;

    let page = dispatch(&state.card_channel, |response| CardRequest::ListCards {
        filter,
        response,
    })
    .await?;

    Ok(Pretty(StatusCode::OK, page).into_response())
}

pub async fn add_card(
    State(state): State<AppState>,
    card: Result<Json<NewCard>, JsonRejection>,
) -> Result<Response, HttpError> {
    let Json(card) = card?;

    let card_id = dispatch(&state.card_channel, |response| CardRequest::AddCard {
        card,
        response,
    })
    .await?;

    Ok(match card_id {
        Some(card_id) => success(format!("Successfully added. Card ID: {}", card_id)),
        None => not_found("User Not Found"),
    })
}

pub async fn update_card(
    State(state): State<AppState>,
    card_id: Result<Path<i64>, PathRejection>,
    update: Result<Json<UpdateCard>, JsonRejection>,
) -> Result<Response, HttpError> {
    let Path(card_id) = card_id?;
    let Json(update) = update?;

    let updated = dispatch(&state.card_channel, |response| CardRequest::UpdateCard {
        card_id,
        balance: update.balance,
        response,
    })
    .await?;

    Ok(applied(updated))
}

pub async fn refill_card(
    State(state): State<AppState>,
    card_id: Result<Path<i64>, PathRejection>,
    refill: Result<Json<Refill>, JsonRejection>,
) -> Result<Response, HttpError> {
    let Path(card_id) = card_id?;
    let Json(refill) = refill?;

    let refilled = dispatch(&state.card_channel, |response| CardRequest::RefillCard {
        card_id,
        amount: refill.add_balance,
        response,
    })
    .await?;

    Ok(applied(refilled))
}

pub async fn transfer_balance(
    State(state): State<AppState>,
    transfer: Result<Json<Transfer>, JsonRejection>,
) -> Result<Response, HttpError> {
    let Json(transfer) = transfer?;

    let transferred = dispatch(&state.card_channel, |response| {
        CardRequest::TransferBalance { transfer, response }
    })
    .await?;

    Ok(applied(transferred))
}

pub async fn delete_card(
    State(state): State<AppState>,
    card_id: Result<Path<i64>, PathRejection>,
) -> Result<Response, HttpError> {
    let Path(card_id) = card_id?;

    let deleted = dispatch(&state.card_channel, |response| CardRequest::DeleteCard {
        card_id,
        response,
    })
    .await?;

    Ok(applied(deleted))
}

fn applied(applied: bool) -> Response {
    if applied {
        success("")
    } else {
        not_found("Not Found")
    }
}
