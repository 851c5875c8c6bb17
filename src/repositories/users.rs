use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};

use super::query::{push_limit_offset, Filter};
use super::{QueryContext, RepositoryError};
use crate::database::Database;
use crate::models::pagination::Pagination;
use crate::models::users::{NewUser, UserFilter, UserInfo};

const LOG_TARGET: &str = "users::repository";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_one(&self, user_id: i64) -> Result<Option<UserInfo>, RepositoryError>;

    async fn find_many(&self, filter: &UserFilter)
        -> Result<Pagination<UserInfo>, RepositoryError>;

    async fn insert_user(&self, user: &NewUser) -> Result<i64, RepositoryError>;

    async fn update_user(&self, user_id: i64, full_name: &str) -> Result<(), RepositoryError>;

    async fn delete_user(&self, user_id: i64) -> Result<(), RepositoryError>;

    /// Unlocked probe, used as a guard before deleting a user.
    async fn exists_cards_for_user(&self, user_id: i64) -> Result<bool, RepositoryError>;
}

#[derive(Clone)]
pub struct UserRepository {
    database: Database,
}

impl UserRepository {
    pub fn new(database: Database) -> Self {
        Self { database }
    }
}

fn user_filter(filter: &UserFilter) -> Filter {
    Filter::new().eq_opt("user_full_name", filter.full_name())
}

fn page_query(filter: &UserFilter) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("SELECT user_id, user_full_name, create_time FROM users");
    user_filter(filter).push_where(&mut builder);
    builder.push(" ORDER BY user_id");
    push_limit_offset(&mut builder, &filter.page_request());
    builder
}

fn count_query(filter: &UserFilter) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM users");
    user_filter(filter).push_where(&mut builder);
    builder
}

#[async_trait]
impl UserStore for UserRepository {
    async fn find_one(&self, user_id: i64) -> Result<Option<UserInfo>, RepositoryError> {
        let user = sqlx::query_as::<_, UserInfo>(
            "SELECT user_id, user_full_name, create_time FROM users WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.database.pool())
        .await
        .context("Cannot query user")?;

        Ok(user)
    }

    async fn find_many(
        &self,
        filter: &UserFilter,
    ) -> Result<Pagination<UserInfo>, RepositoryError> {
        let pool = self.database.pool();

        let items = page_query(filter)
            .build_query_as::<UserInfo>()
            .fetch_all(&pool)
            .await
            .context("Cannot query users")?;

        let count = count_query(filter)
            .build_query_scalar::<i64>()
            .fetch_one(&pool)
            .await
            .context("Cannot count users")?;

        Ok(filter.page_request().into_pagination(items, count))
    }

    async fn insert_user(&self, user: &NewUser) -> Result<i64, RepositoryError> {
        let user_id = sqlx::query_scalar::<_, i64>(
            r#"
                INSERT INTO users (user_full_name)
                VALUES ($1)
                RETURNING user_id
            "#,
        )
        .bind(&user.user_full_name)
        .fetch_one(&self.database.pool())
        .await
        .context("Cannot insert user")?;

        log::debug!(target: LOG_TARGET, "Inserted user {}.", user_id);
        Ok(user_id)
    }

    async fn update_user(&self, user_id: i64, full_name: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE users SET user_full_name = $2 WHERE user_id = $1")
            .bind(user_id)
            .bind(full_name)
            .execute(&self.database.pool())
            .await
            .context("Cannot update user")?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn delete_user(&self, user_id: i64) -> Result<(), RepositoryError> {
        let mut tx = self
            .database
            .pool()
            .begin()
            .await
            .context("Cannot start transaction")?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
            .execute(&mut *tx)
            .await
            .context("Cannot set isolation level")?;

        let result = sqlx::query("DELETE FROM users WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .context("Cannot delete user")?;

        if result.rows_affected() == 0 {
            tx.rollback().await.context("Cannot roll back user delete")?;
            return Err(RepositoryError::NotFound);
        }

        tx.commit().await.context("Cannot commit user delete")?;

        log::debug!(target: LOG_TARGET, "Deleted user {}.", user_id);
        Ok(())
    }

    async fn exists_cards_for_user(&self, user_id: i64) -> Result<bool, RepositoryError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM cards WHERE user_id = $1)",
        )
        .bind(user_id)
        .fetch_one(&self.database.pool())
        .await
        .context("Cannot query user cards")?;

        Ok(exists)
    }
}
