pub mod cards;
pub mod query;
pub mod users;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Not found")]
    NotFound,
    #[error("Insufficient funds")]
    InsufficientFunds,
    #[error("Balance overflow")]
    BalanceOverflow,
    #[error("{context}: {source}")]
    Query {
        context: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

/// Attaches the failing operation to a store error.
pub trait QueryContext<T> {
    fn context(self, context: &'static str) -> Result<T, RepositoryError>;
}

impl<T> QueryContext<T> for Result<T, sqlx::Error> {
    fn context(self, context: &'static str) -> Result<T, RepositoryError> {
        self.map_err(|source| RepositoryError::Query { context, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_names_operation() {
        let result: Result<(), sqlx::Error> = Err(sqlx::Error::PoolTimedOut);
        let error = result.context("Cannot refill card").unwrap_err();

        assert!(matches!(error, RepositoryError::Query { context: "Cannot refill card", .. }));
        assert!(error.to_string().starts_with("Cannot refill card: "));
    }
}
