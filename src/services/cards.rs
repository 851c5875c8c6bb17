use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::oneshot;

use super::{found, respond, RequestHandler, Service, ServiceError};
use crate::models::cards::{CardFilter, CardInfo, NewCard, Transfer};
use crate::models::pagination::Pagination;
use crate::repositories::cards::CardStore;
use crate::repositories::RepositoryError;

const LOG_TARGET: &str = "cards::service";

pub type Responder<T> = oneshot::Sender<Result<T, ServiceError>>;

pub enum CardRequest {
    GetCard {
        card_id: i64,
        response: Responder<Option<CardInfo>>,
    },
    ListCards {
        filter: CardFilter,
        response: Responder<Pagination<CardInfo>>,
    },
    AddCard {
        card: NewCard,
        response: Responder<Option<i64>>,
    },
    UpdateCard {
        card_id: i64,
        balance: i64,
        response: Responder<bool>,
    },
    RefillCard {
        card_id: i64,
        amount: i64,
        response: Responder<bool>,
    },
    TransferBalance {
        transfer: Transfer,
        response: Responder<bool>,
    },
    DeleteCard {
        card_id: i64,
        response: Responder<bool>,
    },
}

#[derive(Clone)]
pub struct CardRequestHandler {
    repository: Arc<dyn CardStore>,
}

impl CardRequestHandler {
    pub fn new(repository: Arc<dyn CardStore>) -> Self {
        CardRequestHandler { repository }
    }

    pub async fn get_card(&self, card_id: i64) -> Result<Option<CardInfo>, ServiceError> {
        Ok(self.repository.find_one(card_id).await?)
    }

    pub async fn list_cards(
        &self,
        filter: &CardFilter,
    ) -> Result<Pagination<CardInfo>, ServiceError> {
        Ok(self.repository.find_many(filter).await?)
    }

    /// Returns `None` when the owning user does not exist.
    pub async fn add_card(&self, card: &NewCard) -> Result<Option<i64>, ServiceError> {
        if card.balance < 0 {
            return Err(ServiceError::BadRequest(
                "Initial balance can not be negative".to_string(),
            ));
        }

        if !self.repository.user_exists(card.user_id).await? {
            return Ok(None);
        }

        match self.repository.insert_card(card).await {
            Ok(card_id) => {
                log::info!(target: LOG_TARGET, "Card {} added for user {}.", card_id, card.user_id);
                Ok(Some(card_id))
            }
            Err(RepositoryError::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn update_card(&self, card_id: i64, balance: i64) -> Result<bool, ServiceError> {
        if balance < 0 {
            return Err(ServiceError::BadRequest(
                "Balance can not be negative".to_string(),
            ));
        }

        found(self.repository.update_balance(card_id, balance).await)
    }

    pub async fn refill_card(&self, card_id: i64, amount: i64) -> Result<bool, ServiceError> {
        if amount < 0 {
            return Err(ServiceError::BadRequest(
                "Can add balance only. Not subtract".to_string(),
            ));
        }

        found(self.repository.refill_balance(card_id, amount).await)
    }

    pub async fn transfer_balance(&self, transfer: &Transfer) -> Result<bool, ServiceError> {
        if transfer.add_balance < 0 {
            return Err(ServiceError::BadRequest(
                "Can add balance only. Not subtract".to_string(),
            ));
        }
        if transfer.card_to < 0 {
            return Err(ServiceError::BadRequest(
                "Invalid value of card id to".to_string(),
            ));
        }
        if transfer.card_from < 0 {
            return Err(ServiceError::BadRequest(
                "Invalid value of card id from".to_string(),
            ));
        }

        let result = self
            .repository
            .transfer_balance(transfer.card_from, transfer.card_to, transfer.add_balance)
            .await;
        if result.is_ok() {
            log::info!(
                target: LOG_TARGET,
                "Transferred {} from card {} to card {}.",
                transfer.add_balance,
                transfer.card_from,
                transfer.card_to
            );
        }

        found(result)
    }

    pub async fn delete_card(&self, card_id: i64) -> Result<bool, ServiceError> {
        found(self.repository.delete_card(card_id).await)
    }
}

#[async_trait]
impl RequestHandler<CardRequest> for CardRequestHandler {
    async fn handle_request(&self, request: CardRequest) {
        match request {
            CardRequest::GetCard { card_id, response } => {
                respond(response, self.get_card(card_id)).await;
            }
            CardRequest::ListCards { filter, response } => {
                respond(response, self.list_cards(&filter)).await;
            }
            CardRequest::AddCard { card, response } => {
                respond(response, self.add_card(&card)).await;
            }
            CardRequest::UpdateCard {
                card_id,
                balance,
                response,
            } => {
                respond(response, self.update_card(card_id, balance)).await;
            }
            CardRequest::RefillCard {
                card_id,
                amount,
                response,
            } => {
                respond(response, self.refill_card(card_id, amount)).await;
            }
            CardRequest::TransferBalance { transfer, response } => {
                respond(response, self.transfer_balance(&transfer)).await;
            }
            CardRequest::DeleteCard { card_id, response } => {
                respond(response, self.delete_card(card_id)).await;
            }
        }
    }
}

pub struct CardService;

impl CardService {
    pub fn new() -> Self {
        CardService {}
    }
}

#[async_trait]
impl Service<CardRequest, CardRequestHandler> for CardService {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::cards::MockCardStore;
    use mockall::predicate::eq;
    use tokio::sync::mpsc;

    fn handler(store: MockCardStore) -> CardRequestHandler {
        CardRequestHandler::new(Arc::new(store))
    }

    fn card(card_id: i64, balance: i64) -> CardInfo {
        CardInfo {
            card_id,
            user_id: 1,
            user_full_name: "Ada Lovelace".to_string(),
            balance,
            create_time: chrono::NaiveDateTime::default(),
        }
    }

    #[tokio::test]
    async fn test_get_card_absent() {
        let mut store = MockCardStore::new();
        store.expect_find_one().with(eq(9)).returning(|_| Ok(None));

        assert_eq!(handler(store).get_card(9).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_add_card_requires_existing_user() {
        let mut store = MockCardStore::new();
        store.expect_user_exists().with(eq(3)).returning(|_| Ok(false));
        store.expect_insert_card().never();

        let result = handler(store)
            .add_card(&NewCard { user_id: 3, balance: 10 })
            .await
            .unwrap();

        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_add_card_owner_deleted_before_insert() {
        let mut store = MockCardStore::new();
        store.expect_user_exists().returning(|_| Ok(true));
        store
            .expect_insert_card()
            .returning(|_| Err(RepositoryError::NotFound));

        let result = handler(store)
            .add_card(&NewCard { user_id: 3, balance: 0 })
            .await
            .unwrap();

        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_add_card_returns_new_id() {
        let mut store = MockCardStore::new();
        store.expect_user_exists().returning(|_| Ok(true));
        store
            .expect_insert_card()
            .withf(|card| card.user_id == 3 && card.balance == 100)
            .returning(|_| Ok(42));

        let result = handler(store)
            .add_card(&NewCard { user_id: 3, balance: 100 })
            .await
            .unwrap();

        assert_eq!(result, Some(42));
    }

    #[tokio::test]
    async fn test_add_card_rejects_negative_balance() {
        let mut store = MockCardStore::new();
        store.expect_user_exists().never();

        let error = handler(store)
            .add_card(&NewCard { user_id: 3, balance: -1 })
            .await
            .unwrap_err();

        assert!(matches!(error, ServiceError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_update_card_not_found() {
        let mut store = MockCardStore::new();
        store
            .expect_update_balance()
            .with(eq(5), eq(70))
            .returning(|_, _| Err(RepositoryError::NotFound));

        assert!(!handler(store).update_card(5, 70).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_card_rejects_negative_balance() {
        let mut store = MockCardStore::new();
        store.expect_update_balance().never();

        let error = handler(store).update_card(5, -70).await.unwrap_err();

        assert!(matches!(error, ServiceError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_refill_rejects_negative_amount() {
        let mut store = MockCardStore::new();
        store.expect_refill_balance().never();

        let error = handler(store).refill_card(2, -10).await.unwrap_err();

        assert!(
            matches!(error, ServiceError::BadRequest(message) if message == "Can add balance only. Not subtract")
        );
    }

    #[tokio::test]
    async fn test_refill_applied() {
        let mut store = MockCardStore::new();
        store
            .expect_refill_balance()
            .with(eq(2), eq(10))
            .times(1)
            .returning(|_, _| Ok(()));

        assert!(handler(store).refill_card(2, 10).await.unwrap());
    }

    #[tokio::test]
    async fn test_transfer_insufficient_funds_is_bad_request() {
        let mut store = MockCardStore::new();
        store
            .expect_transfer_balance()
            .with(eq(1), eq(2), eq(1000))
            .returning(|_, _, _| Err(RepositoryError::InsufficientFunds));

        let error = handler(store)
            .transfer_balance(&Transfer {
                card_from: 1,
                card_to: 2,
                add_balance: 1000,
            })
            .await
            .unwrap_err();

        assert!(matches!(error, ServiceError::BadRequest(message) if message == "Insufficient funds"));
    }

    #[tokio::test]
    async fn test_transfer_missing_card() {
        let mut store = MockCardStore::new();
        store
            .expect_transfer_balance()
            .returning(|_, _, _| Err(RepositoryError::NotFound));

        let applied = handler(store)
            .transfer_balance(&Transfer {
                card_from: 1,
                card_to: 99,
                add_balance: 5,
            })
            .await
            .unwrap();

        assert!(!applied);
    }

    #[tokio::test]
    async fn test_transfer_validates_before_touching_store() {
        let mut store = MockCardStore::new();
        store.expect_transfer_balance().never();
        let handler = handler(store);

        for transfer in [
            Transfer { card_from: 1, card_to: 2, add_balance: -1 },
            Transfer { card_from: 1, card_to: -2, add_balance: 1 },
            Transfer { card_from: -1, card_to: 2, add_balance: 1 },
        ] {
            let error = handler.transfer_balance(&transfer).await.unwrap_err();
            assert!(matches!(error, ServiceError::BadRequest(_)));
        }
    }

    #[tokio::test]
    async fn test_delete_card_store_failure_propagates() {
        let mut store = MockCardStore::new();
        store.expect_delete_card().returning(|_| {
            Err(RepositoryError::Query {
                context: "Cannot delete card",
                source: sqlx::Error::PoolClosed,
            })
        });

        let error = handler(store).delete_card(4).await.unwrap_err();

        assert!(matches!(error, ServiceError::Database(_)));
    }

    #[tokio::test]
    async fn test_service_answers_over_channel() {
        let mut store = MockCardStore::new();
        store
            .expect_find_many()
            .withf(|filter| filter.page == 2 && filter.size == 2)
            .returning(|filter| {
                Ok(filter
                    .page_request()
                    .into_pagination(vec![card(103, 0), card(104, 0)], 5))
            });

        let (tx, mut rx) = mpsc::channel(8);
        let handler = handler(store);
        tokio::spawn(async move {
            CardService::new().run(handler, &mut rx).await;
        });

        let (response_tx, response_rx) = oneshot::channel();
        tx.send(CardRequest::ListCards {
            filter: CardFilter {
                user_id: None,
                page: 2,
                size: 2,
            },
            response: response_tx,
        })
        .await
        .unwrap();

        let page = response_rx.await.unwrap().unwrap();
        assert_eq!(page.pages_count, 3);
        assert_eq!(page.items_count, 5);
        assert_eq!(
            page.items.iter().map(|c| c.card_id).collect::<Vec<_>>(),
            vec![103, 104]
        );
    }
}
