//! PostgreSQL connection setup.

use crate::config::Config;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

/// Pool shared by every partition log.
pub type Pool = PgPool;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Connect to the configured database and apply pending migrations.
///
/// Returns `None` when `DATABASE_URL` is unset; partition logs are then
/// kept in memory only and lost on restart.
pub async fn connect(config: &Config) -> Result<Option<Pool>, sqlx::Error> {
    let Some(url) = &config.database_url else {
        tracing::warn!("DATABASE_URL not set; partition logs are kept in memory only");
        return Ok(None);
    };

    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(url)
        .await?;

    tracing::info!(
        max_connections = config.db_max_connections,
        "Connected to PostgreSQL, running migrations"
    );
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(Some(pool))
}
