use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use redis::AsyncCommands;

use crate::dto::{HealthDependencyStatus, HealthResponse};
use crate::state::AppState;

/// Liveness plus dependency checks. Unconfigured backends report `disabled`
/// and do not degrade readiness.
pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let postgres = match state.postgres_pool.as_ref() {
        Some(pool) => check_postgres(pool).await,
        None => HealthDependencyStatus::disabled(),
    };
    let redis = match state.redis_client.as_ref() {
        Some(client) => check_redis(client).await,
        None => HealthDependencyStatus::disabled(),
    };

    let ready = !postgres.is_error() && !redis.is_error();
    let (http_status, status) = if ready {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        http_status,
        Json(HealthResponse {
            status,
            ready,
            postgres,
            redis,
        }),
    )
}

async fn check_postgres(pool: &sqlx::PgPool) -> HealthDependencyStatus {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await
        .map_or_else(
            |error| HealthDependencyStatus::error(format!("postgres check failed: {error}")),
            |_| HealthDependencyStatus::ok(),
        )
}

async fn check_redis(client: &redis::Client) -> HealthDependencyStatus {
    let mut connection = match client.get_multiplexed_async_connection().await {
        Ok(connection) => connection,
        Err(error) => {
            return HealthDependencyStatus::error(format!("redis connection failed: {error}"));
        }
    };

    match connection.ping::<String>().await {
        Ok(reply) if reply.eq_ignore_ascii_case("pong") => HealthDependencyStatus::ok(),
        Ok(reply) => HealthDependencyStatus::error(format!("unexpected redis ping reply: {reply}")),
        Err(error) => HealthDependencyStatus::error(format!("redis ping failed: {error}")),
    }
}
