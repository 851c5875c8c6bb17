use std::sync::Arc;

use async_trait::async_trait;

use super::cards::Responder;
use super::{found, respond, RequestHandler, Service, ServiceError};
use crate::models::pagination::Pagination;
use crate::models::users::{NewUser, UserFilter, UserInfo};
use crate::repositories::users::UserStore;

const LOG_TARGET: &str = "users::service";

pub enum UserRequest {
    GetUser {
        user_id: i64,
        response: Responder<Option<UserInfo>>,
    },
    ListUsers {
        filter: UserFilter,
        response: Responder<Pagination<UserInfo>>,
    },
    AddUser {
        user: NewUser,
        response: Responder<i64>,
    },
    UpdateUser {
        user_id: i64,
        full_name: String,
        response: Responder<bool>,
    },
    DeleteUser {
        user_id: i64,
        response: Responder<bool>,
    },
}

#[derive(Clone)]
pub struct UserRequestHandler {
    repository: Arc<dyn UserStore>,
}

impl UserRequestHandler {
    pub fn new(repository: Arc<dyn UserStore>) -> Self {
        UserRequestHandler { repository }
    }

    pub async fn get_user(&self, user_id: i64) -> Result<Option<UserInfo>, ServiceError> {
        Ok(self.repository.find_one(user_id).await?)
    }

    pub async fn list_users(
        &self,
        filter: &UserFilter,
    ) -> Result<Pagination<UserInfo>, ServiceError> {
        Ok(self.repository.find_many(filter).await?)
    }

    pub async fn add_user(&self, user: &NewUser) -> Result<i64, ServiceError> {
        let user_id = self.repository.insert_user(user).await?;
        log::info!(target: LOG_TARGET, "User {} added.", user_id);
        Ok(user_id)
    }

    pub async fn update_user(&self, user_id: i64, full_name: &str) -> Result<bool, ServiceError> {
        found(self.repository.update_user(user_id, full_name).await)
    }

    /// A user can only be deleted once they no longer own any card.
    pub async fn delete_user(&self, user_id: i64) -> Result<bool, ServiceError> {
        if self.repository.exists_cards_for_user(user_id).await? {
            return Err(ServiceError::BadRequest(
                "Cant delete user, because exist his cards".to_string(),
            ));
        }

        let deleted = found(self.repository.delete_user(user_id).await)?;
        if deleted {
            log::info!(target: LOG_TARGET, "User {} deleted.", user_id);
        }
        Ok(deleted)
    }
}

#[async_trait]
impl RequestHandler<UserRequest> for UserRequestHandler {
    async fn handle_request(&self, request: UserRequest) {
        match request {
            UserRequest::GetUser { user_id, response } => {
                respond(response, self.get_user(user_id)).await;
            }
            UserRequest::ListUsers { filter, response } => {
                respond(response, self.list_users(&filter)).await;
            }
            UserRequest::AddUser { user, response } => {
                respond(response, self.add_user(&user)).await;
            }
            UserRequest::UpdateUser {
                user_id,
                full_name,
                response,
            } => {
                respond(response, self.update_user(user_id, &full_name)).await;
            }
            UserRequest::DeleteUser { user_id, response } => {
                respond(response, self.delete_user(user_id)).await;
            }
        }
    }
}

pub struct UserService;

impl UserService {
    pub fn new() -> Self {
        UserService {}
    }
}

#[async_trait]
impl Service<UserRequest, UserRequestHandler> for UserService {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::users::MockUserStore;
    use crate::repositories::RepositoryError;
    use mockall::predicate::eq;

    fn handler(store: MockUserStore) -> UserRequestHandler {
        UserRequestHandler::new(Arc::new(store))
    }

    #[tokio::test]
    async fn test_delete_user_with_cards_is_rejected() {
        let mut store = MockUserStore::new();
        store
            .expect_exists_cards_for_user()
            .with(eq(1))
            .returning(|_| Ok(true));
        store.expect_delete_user().never();

        let error = handler(store).delete_user(1).await.unwrap_err();

        assert!(matches!(error, ServiceError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_delete_user_without_cards() {
        let mut store = MockUserStore::new();
        store.expect_exists_cards_for_user().returning(|_| Ok(false));
        store
            .expect_delete_user()
            .with(eq(1))
            .times(1)
            .returning(|_| Ok(()));

        assert!(handler(store).delete_user(1).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_missing_user() {
        let mut store = MockUserStore::new();
        store.expect_exists_cards_for_user().returning(|_| Ok(false));
        store
            .expect_delete_user()
            .returning(|_| Err(RepositoryError::NotFound));

        assert!(!handler(store).delete_user(8).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_missing_user() {
        let mut store = MockUserStore::new();
        store
            .expect_update_user()
            .withf(|user_id, full_name| *user_id == 8 && full_name == "Grace Hopper")
            .returning(|_, _| Err(RepositoryError::NotFound));

        assert!(!handler(store).update_user(8, "Grace Hopper").await.unwrap());
    }

    #[tokio::test]
    async fn test_add_user_returns_id() {
        let mut store = MockUserStore::new();
        store
            .expect_insert_user()
            .withf(|user| user.user_full_name == "Ada Lovelace")
            .returning(|_| Ok(17));

        let user_id = handler(store)
            .add_user(&NewUser {
                user_full_name: "Ada Lovelace".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(user_id, 17);
    }
}
