use std::sync::Arc;

use arc_swap::ArcSwap;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::settings::Postgres;

/// Shared handle to the current connection pool.
///
/// Readers take a cheap snapshot with [`Database::pool`]; the pool itself is
/// only ever replaced through [`Database::reconnect`] or [`Database::replace`].
#[derive(Clone)]
pub struct Database {
    pool: Arc<ArcSwap<PgPool>>,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(ArcSwap::from_pointee(pool)),
        }
    }

    pub async fn connect(settings: &Postgres) -> Result<Self, anyhow::Error> {
        let pool = open_pool(settings).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> PgPool {
        self.pool.load().as_ref().clone()
    }

    pub async fn reconnect(&self, settings: &Postgres) -> Result<(), anyhow::Error> {
        let pool = open_pool(settings).await?;
        self.replace(pool).await;
        Ok(())
    }

    /// Swaps in `pool` and closes the previous one once its checked-out
    /// connections have been returned.
    pub async fn replace(&self, pool: PgPool) {
        let previous = self.pool.swap(Arc::new(pool));
        previous.close().await;
        log::info!(target: "database", "Database pool replaced.");
    }

    pub async fn close(&self) {
        self.pool.load().close().await;
    }
}

async fn open_pool(settings: &Postgres) -> Result<PgPool, anyhow::Error> {
    let options = settings.connect_options()?;

    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .connect_with(options)
        .await
        .map_err(|e| {
            anyhow::anyhow!(
                "Could not connect to postgres at {}:{}: {}",
                settings.host,
                settings.port,
                e
            )
        })?;

    sqlx::query("SELECT 1")
        .execute(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Postgres ping failed: {}", e))?;

    log::info!(
        target: "database",
        "Connected to postgres at {}:{}/{}.",
        settings.host,
        settings.port,
        settings.name
    );

    Ok(pool)
}
