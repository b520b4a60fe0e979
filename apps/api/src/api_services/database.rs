use std::time::Duration;

use civicvault_core::AppError;
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;

static MIGRATOR: Migrator = sqlx::migrate!("../../crates/infrastructure/migrations");

const MAX_CONNECTIONS: u32 = 10;

/// Opens the tenant store pool and applies pending schema migrations.
///
/// Acquiring a connection shares the per-operation read budget so a
/// saturated pool surfaces as a timeout rather than a stalled request.
pub async fn connect_and_migrate(
    database_url: &str,
    acquire_timeout: Duration,
) -> Result<PgPool, AppError> {
    let pool = PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .acquire_timeout(acquire_timeout)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))?;

    MIGRATOR
        .run(&pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;

    Ok(pool)
}
