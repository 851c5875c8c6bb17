use async_trait::async_trait;
use sqlx::{PgConnection, Postgres, QueryBuilder};

use super::query::{push_limit_offset, Filter};
use super::{QueryContext, RepositoryError};
use crate::database::Database;
use crate::models::cards::{CardFilter, CardInfo, NewCard};
use crate::models::pagination::Pagination;

const LOG_TARGET: &str = "cards::repository";

const SELECT_CARD: &str = r#"
    SELECT cards.card_id, users.user_id, users.user_full_name, cards.balance, cards.create_time
    FROM cards INNER JOIN users ON cards.user_id = users.user_id
"#;

/// Card persistence. Every balance mutation runs in its own transaction and
/// takes a row lock on each card it reads before writing it back.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CardStore: Send + Sync {
    async fn find_one(&self, card_id: i64) -> Result<Option<CardInfo>, RepositoryError>;

    async fn find_many(&self, filter: &CardFilter)
        -> Result<Pagination<CardInfo>, RepositoryError>;

    async fn user_exists(&self, user_id: i64) -> Result<bool, RepositoryError>;

    /// Fails with `NotFound` when the owner does not exist at insert time.
    async fn insert_card(&self, card: &NewCard) -> Result<i64, RepositoryError>;

    async fn update_balance(&self, card_id: i64, balance: i64) -> Result<(), RepositoryError>;

    async fn refill_balance(&self, card_id: i64, amount: i64) -> Result<(), RepositoryError>;

    async fn transfer_balance(
        &self,
        card_from: i64,
        card_to: i64,
        amount: i64,
    ) -> Result<(), RepositoryError>;

    async fn delete_card(&self, card_id: i64) -> Result<(), RepositoryError>;
}

#[derive(Clone)]
pub struct CardRepository {
    database: Database,
}

impl CardRepository {
    pub fn new(database: Database) -> Self {
        Self { database }
    }
}

fn card_filter(filter: &CardFilter) -> Filter {
    Filter::new().eq_opt("cards.user_id", filter.owner())
}

fn page_query(filter: &CardFilter) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(SELECT_CARD);
    card_filter(filter).push_where(&mut builder);
    builder.push(" ORDER BY cards.card_id");
    push_limit_offset(&mut builder, &filter.page_request());
    builder
}

fn count_query(filter: &CardFilter) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM cards");
    card_filter(filter).push_where(&mut builder);
    builder
}

async fn lock_balance(conn: &mut PgConnection, card_id: i64) -> Result<i64, RepositoryError> {
    sqlx::query_scalar::<_, i64>("SELECT balance FROM cards WHERE card_id = $1 FOR UPDATE")
        .bind(card_id)
        .fetch_optional(conn)
        .await
        .context("Cannot lock card")?
        .ok_or(RepositoryError::NotFound)
}

async fn write_balance(
    conn: &mut PgConnection,
    card_id: i64,
    balance: i64,
) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE cards SET balance = $2 WHERE card_id = $1")
        .bind(card_id)
        .bind(balance)
        .execute(conn)
        .await
        .context("Cannot update card balance")?;

    Ok(())
}

#[async_trait]
impl CardStore for CardRepository {
    async fn find_one(&self, card_id: i64) -> Result<Option<CardInfo>, RepositoryError> {
        let card = sqlx::query_as::<_, CardInfo>(&format!(
            "{} WHERE cards.card_id = $1",
            SELECT_CARD
        ))
        .bind(card_id)
        .fetch_optional(&self.database.pool())
        .await
        .context("Cannot query card")?;

        Ok(card)
    }

    async fn find_many(
        &self,
        filter: &CardFilter,
    ) -> Result<Pagination<CardInfo>, RepositoryError> {
        let pool = self.database.pool();

        let items = page_query(filter)
            .build_query_as::<CardInfo>()
            .fetch_all(&pool)
            .await
            .context("Cannot query cards")?;

        let count = count_query(filter)
            .build_query_scalar::<i64>()
            .fetch_one(&pool)
            .await
            .context("Cannot count cards")?;

        Ok(filter.page_request().into_pagination(items, count))
    }

    async fn user_exists(&self, user_id: i64) -> Result<bool, RepositoryError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE user_id = $1)",
        )
        .bind(user_id)
        .fetch_one(&self.database.pool())
        .await
        .context("Cannot query user")?;

        Ok(exists)
    }

    async fn insert_card(&self, card: &NewCard) -> Result<i64, RepositoryError> {
        let mut tx = self
            .database
            .pool()
            .begin()
            .await
            .context("Cannot start transaction")?;

        // Holds off a concurrent delete of the owner until the card is committed.
        sqlx::query_scalar::<_, i64>("SELECT user_id FROM users WHERE user_id = $1 FOR KEY SHARE")
            .bind(card.user_id)
            .fetch_optional(&mut *tx)
            .await
            .context("Cannot lock card owner")?
            .ok_or(RepositoryError::NotFound)?;

        let card_id = sqlx::query_scalar::<_, i64>(
            r#"
                INSERT INTO cards (user_id, balance)
                VALUES ($1, $2)
                RETURNING card_id
            "#,
        )
        .bind(card.user_id)
        .bind(card.balance)
        .fetch_one(&mut *tx)
        .await
        .context("Cannot insert card")?;

        tx.commit().await.context("Cannot commit card insert")?;

        log::debug!(target: LOG_TARGET, "Inserted card {} for user {}.", card_id, card.user_id);
        Ok(card_id)
    }

    async fn update_balance(&self, card_id: i64, balance: i64) -> Result<(), RepositoryError> {
        let mut tx = self
            .database
            .pool()
            .begin()
            .await
            .context("Cannot start transaction")?;

        lock_balance(&mut tx, card_id).await?;
        write_balance(&mut tx, card_id, balance).await?;

        tx.commit().await.context("Cannot commit balance update")?;

        log::debug!(target: LOG_TARGET, "Set balance of card {} to {}.", card_id, balance);
        Ok(())
    }

    async fn refill_balance(&self, card_id: i64, amount: i64) -> Result<(), RepositoryError> {
        let mut tx = self
            .database
            .pool()
            .begin()
            .await
            .context("Cannot start transaction")?;

        let balance = lock_balance(&mut tx, card_id).await?;
        let balance = balance
            .checked_add(amount)
            .ok_or(RepositoryError::BalanceOverflow)?;
        write_balance(&mut tx, card_id, balance).await?;

        tx.commit().await.context("Cannot commit refill")?;

        log::debug!(target: LOG_TARGET, "Refilled card {} by {}.", card_id, amount);
        Ok(())
    }

    async fn transfer_balance(
        &self,
        card_from: i64,
        card_to: i64,
        amount: i64,
    ) -> Result<(), RepositoryError> {
        let mut tx = self
            .database
            .pool()
            .begin()
            .await
            .context("Cannot start transaction")?;

        // Rows are always locked in ascending id order so that two transfers
        // running in opposite directions cannot deadlock.
        let (first, second) = if card_from <= card_to {
            (card_from, card_to)
        } else {
            (card_to, card_from)
        };
        let first_balance = lock_balance(&mut tx, first).await?;
        let second_balance = if second == first {
            first_balance
        } else {
            lock_balance(&mut tx, second).await?
        };
        let (from_balance, to_balance) = if card_from <= card_to {
            (first_balance, second_balance)
        } else {
            (second_balance, first_balance)
        };

        let from_new = from_balance - amount;
        if from_new < 0 {
            tx.rollback().await.context("Cannot roll back transfer")?;
            log::info!(
                target: LOG_TARGET,
                "Rejected transfer of {} from card {}: balance is {}.",
                amount,
                card_from,
                from_balance
            );
            return Err(RepositoryError::InsufficientFunds);
        }

        if card_from != card_to {
            let to_new = to_balance
                .checked_add(amount)
                .ok_or(RepositoryError::BalanceOverflow)?;
            write_balance(&mut tx, card_from, from_new).await?;
            write_balance(&mut tx, card_to, to_new).await?;
        }

        tx.commit().await.context("Cannot commit transfer")?;

        log::debug!(
            target: LOG_TARGET,
            "Transferred {} from card {} to card {}.",
            amount,
            card_from,
            card_to
        );
        Ok(())
    }

    async fn delete_card(&self, card_id: i64) -> Result<(), RepositoryError> {
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

        lock_balance(&mut tx, card_id).await?;
        sqlx::query("DELETE FROM cards WHERE card_id = $1")
            .bind(card_id)
            .execute(&mut *tx)
            .await
            .context("Cannot delete card")?;

        tx.commit().await.context("Cannot commit card delete")?;

        log::debug!(target: LOG_TARGET, "Deleted card {}.", card_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_query_without_owner() {
        let filter = CardFilter {
            user_id: None,
            page: 2,
            size: 2,
        };
        let sql = page_query(&filter).sql().split_whitespace().collect::<Vec<_>>().join(" ");

        assert!(sql.starts_with("SELECT cards.card_id, users.user_id"));
        assert!(sql.ends_with("ORDER BY cards.card_id LIMIT $1 OFFSET $2"));
        assert!(!sql.contains("WHERE"));
    }

    #[test]
    fn test_page_query_with_owner() {
        let filter = CardFilter {
            user_id: Some(4),
            page: 1,
            size: 10,
        };
        let sql = page_query(&filter).sql().split_whitespace().collect::<Vec<_>>().join(" ");

        assert!(sql.ends_with(
            "WHERE cards.user_id = $1 ORDER BY cards.card_id LIMIT $2 OFFSET $3"
        ));
    }

    #[test]
    fn test_zero_owner_means_no_filter() {
        let filter = CardFilter {
            user_id: Some(0),
            page: 1,
            size: 10,
        };

        assert_eq!(count_query(&filter).sql(), "SELECT COUNT(*) FROM cards");
    }

    #[test]
    fn test_count_query_shares_predicates() {
        let filter = CardFilter {
            user_id: Some(4),
            page: 3,
            size: 10,
        };

        assert_eq!(
            count_query(&filter).sql(),
            "SELECT COUNT(*) FROM cards WHERE cards.user_id = $1"
        );
    }
}
