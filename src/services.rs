use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::database::Database;
use crate::repositories::cards::CardRepository;
use crate::repositories::users::UserRepository;
use crate::repositories::RepositoryError;
use crate::settings::Settings;

pub mod cards;
pub mod http;
pub mod users;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Database error: {0}")]
    Database(String),
    #[error("Communication error: {0} - {1}")]
    Communication(String, String),
}

impl From<RepositoryError> for ServiceError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::NotFound => ServiceError::NotFound("Not Found".to_string()),
            RepositoryError::InsufficientFunds | RepositoryError::BalanceOverflow => {
                ServiceError::BadRequest(error.to_string())
            }
            RepositoryError::Query { .. } => ServiceError::Database(error.to_string()),
        }
    }
}

/// Maps a repository outcome to "applied" (`true`) or "no such row" (`false`).
fn found(result: Result<(), RepositoryError>) -> Result<bool, ServiceError> {
    match result {
        Ok(()) => Ok(true),
        Err(RepositoryError::NotFound) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Runs `operation` unless the caller stops waiting for the answer first, in
/// which case the operation is dropped along with any open transaction.
async fn respond<T, F>(mut response: oneshot::Sender<Result<T, ServiceError>>, operation: F)
where
    F: Future<Output = Result<T, ServiceError>>,
{
    let result = tokio::select! {
        result = operation => Some(result),
        _ = response.closed() => None,
    };

    match result {
        Some(result) => {
            let _ = response.send(result);
        }
        None => log::warn!(target: "service", "Caller went away, request aborted."),
    }
}

#[async_trait]
pub trait RequestHandler<T>: Send + Sync + 'static
where
    T: Send + 'static,
{
    async fn handle_request(&self, request: T);
}

#[async_trait]
pub trait Service<T, H>: Send + Sync + 'static
where
    T: Send + 'static,
    H: RequestHandler<T> + Clone + Send,
{
    async fn run(&mut self, handler: H, receiver: &mut mpsc::Receiver<T>) {
        while let Some(request) = receiver.recv().await {
            let handler = handler.clone();

            tokio::spawn(async move {
                handler.handle_request(request).await;
            });
        }
    }
}

pub struct Channels {
    pub cards: mpsc::Sender<cards::CardRequest>,
    pub users: mpsc::Sender<users::UserRequest>,
}

/// Spawns the card and user services on top of `database`.
pub fn spawn_services(database: &Database) -> Channels {
    let (card_tx, mut card_rx) = mpsc::channel(512);
    let (user_tx, mut user_rx) = mpsc::channel(512);

    log::info!("Starting card service.");
    let card_handler =
        cards::CardRequestHandler::new(Arc::new(CardRepository::new(database.clone())));
    tokio::spawn(async move {
        cards::CardService::new()
            .run(card_handler, &mut card_rx)
            .await;
    });

    log::info!("Starting user service.");
    let user_handler =
        users::UserRequestHandler::new(Arc::new(UserRepository::new(database.clone())));
    tokio::spawn(async move {
        users::UserService::new()
            .run(user_handler, &mut user_rx)
            .await;
    });

    Channels {
        cards: card_tx,
        users: user_tx,
    }
}

pub async fn start_services(
    database: Database,
    settings: Settings,
    config_path: String,
) -> Result<(), anyhow::Error> {
    let channels = spawn_services(&database);

    #[cfg(unix)]
    tokio::spawn(reconnect_on_hangup(database.clone(), config_path));
    #[cfg(not(unix))]
    let _ = config_path;

    log::info!("Starting HTTP server.");
    http::start_http_server(&settings.listen, channels, shutdown_signal()).await?;

    log::info!("HTTP server stopped, closing database pool.");
    database.close().await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Could not listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match (signal(SignalKind::terminate()), signal(SignalKind::quit())) {
            (Ok(mut terminate), Ok(mut quit)) => {
                tokio::select! {
                    _ = terminate.recv() => {}
                    _ = quit.recv() => {}
                }
            }
            (Err(e), _) | (_, Err(e)) => {
                log::error!("Could not install signal handlers: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => log::warn!("Caught interrupt. Shutting down..."),
        _ = terminate => log::warn!("Caught termination signal. Shutting down..."),
    }
}

#[cfg(unix)]
async fn reconnect_on_hangup(database: Database, config_path: String) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(hangup) => hangup,
        Err(e) => {
            log::error!("Could not listen for SIGHUP: {}", e);
            return;
        }
    };

    while hangup.recv().await.is_some() {
        log::info!("Caught SIGHUP, reconnecting to the database.");

        let settings = match Settings::new(&config_path) {
            Ok(settings) => settings,
            Err(e) => {
                log::error!("Could not reload config {}: {}", config_path, e);
                continue;
            }
        };

        if let Err(e) = database.reconnect(&settings.postgres).await {
            log::error!("Database reconnect failed, keeping the current pool: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_found_translates_not_found() {
        assert!(found(Ok(())).unwrap());
        assert!(!found(Err(RepositoryError::NotFound)).unwrap());
    }

    #[test]
    fn test_found_propagates_other_errors() {
        let error = found(Err(RepositoryError::InsufficientFunds)).unwrap_err();
        assert!(matches!(error, ServiceError::BadRequest(message) if message == "Insufficient funds"));

        let error = found(Err(RepositoryError::Query {
            context: "Cannot lock card",
            source: sqlx::Error::PoolTimedOut,
        }))
        .unwrap_err();
        assert!(matches!(error, ServiceError::Database(message) if message.starts_with("Cannot lock card")));
    }

    #[tokio::test]
    async fn test_respond_delivers_result() {
        let (tx, rx) = oneshot::channel();

        respond(tx, async { Ok::<_, ServiceError>(7) }).await;

        assert_eq!(rx.await.unwrap().unwrap(), 7);
    }

    #[tokio::test]
    async fn test_respond_aborts_when_caller_is_gone() {
        let (tx, rx) = oneshot::channel::<Result<(), ServiceError>>();
        drop(rx);

        // Would hang forever if the closed caller were not noticed.
        respond(tx, std::future::pending()).await;
    }
}
