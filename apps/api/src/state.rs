use std::sync::Arc;

use civicvault_application::AccessMiddleware;
use sqlx::PgPool;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub middleware: AccessMiddleware,
    pub gateway_shared_secret: Arc<str>,
    pub postgres_pool: Option<PgPool>,
    pub redis_client: Option<redis::Client>,
}
