use crate::config::Config;
use crate::database::memory::MemoryStore;
use crate::database::postgres::PgStore;
use crate::database::store::QuizStore;
use crate::error::Result;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::sync::Arc;

pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Postgres when a database URL is configured, the in-memory store otherwise.
pub async fn connect_store(config: &Config) -> Result<Arc<dyn QuizStore>> {
    match &config.database_url {
        Some(url) => {
            let pool = create_pool(url, config.db_max_connections).await?;
            sqlx::migrate!("./migrations").run(&pool).await?;
            tracing::info!(max_connections = config.db_max_connections, "connected to postgres");
            Ok(Arc::new(PgStore::new(pool)))
        }
        None => {
            tracing::warn!("DATABASE_URL is not set, results will only live in memory");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
