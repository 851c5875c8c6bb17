use std::future::Future;
use std::time::Duration;

use axum::{
    extract::Request,
    http::{header, HeaderValue, Method, StatusCode},
    middleware,
    routing::{get, post},
    Router,
};
use tokio::sync::{mpsc, oneshot};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::cards::{CardRequest, Responder};
use super::users::UserRequest;
use super::{Channels, ServiceError};
use crate::settings::Listen;
use response::HttpError;

mod cards;
pub mod response;
mod users;

#[derive(Clone)]
pub struct AppState {
    card_channel: mpsc::Sender<CardRequest>,
    user_channel: mpsc::Sender<UserRequest>,
}

impl From<Channels> for AppState {
    fn from(channels: Channels) -> Self {
        AppState {
            card_channel: channels.cards,
            user_channel: channels.users,
        }
    }
}

/// Sends one request to a service and waits for its answer.
async fn dispatch<R, T>(
    channel: &mpsc::Sender<R>,
    request: impl FnOnce(Responder<T>) -> R,
) -> Result<T, HttpError> {
    let (response_tx, response_rx) = oneshot::channel();

    channel
        .send(request(response_tx))
        .await
        .map_err(|e| ServiceError::Communication("HTTP".to_string(), e.to_string()))?;

    let result = response_rx
        .await
        .map_err(|e| ServiceError::Communication("HTTP".to_string(), e.to_string()))?;

    Ok(result?)
}

/// Bodies sent without a content type, or as a plain form, are read as JSON.
async fn default_json_content_type(mut request: Request) -> Request {
    if matches!(*request.method(), Method::POST | Method::PUT | Method::PATCH) {
        let needs_default = match request.headers().get(header::CONTENT_TYPE) {
            None => true,
            Some(value) => match value.to_str() {
                Ok(value) => {
                    let media_type = value.split(';').next().unwrap_or_default().trim();
                    media_type.is_empty()
                        || media_type.eq_ignore_ascii_case("application/x-www-form-urlencoded")
                }
                Err(_) => false,
            },
        };

        if needs_default {
            request.headers_mut().insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
        }
    }

    request
}

pub fn router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/users", get(users::list_users).post(users::add_user))
        .route(
            "/users/{id}",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route("/cards", get(cards::list_cards).post(cards::add_card))
        .route("/cards/transfer", post(cards::transfer_balance))
        .route(
            "/cards/{id}",
            get(cards::get_card)
                .put(cards::update_card)
                .delete(cards::delete_card)
                .post(cards::refill_card),
        )
        .route("/health", get(|| async { "OK" }))
        .layer(middleware::map_request(default_json_content_type))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache, no-store, must-revalidate"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::PRAGMA,
            HeaderValue::from_static("no-cache"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::EXPIRES,
            HeaderValue::from_static("0"),
        ))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_http_server(
    listen: &Listen,
    channels: Channels,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), anyhow::Error> {
    let app = router(AppState::from(channels), listen.request_timeout());

    let listener = tokio::net::TcpListener::bind(listen.address()).await?;
    log::info!(target: "http", "Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
