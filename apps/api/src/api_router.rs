use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, post, put};
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{handlers, middleware};

pub fn build_router(app_state: AppState) -> Router {
    let tenant_routes = Router::new()
        .route("/api/records", get(handlers::records::list_records_handler))
        .route(
            "/api/records/{resource_type}/{resource_id}",
            get(handlers::records::get_record_handler)
                .put(handlers::records::put_record_handler)
                .delete(handlers::records::delete_record_handler),
        )
        .route(
            "/api/cache/{key}",
            get(handlers::cache::get_cache_handler)
                .put(handlers::cache::put_cache_handler)
                .delete(handlers::cache::invalidate_cache_handler),
        )
        .route(
            "/api/storage/path",
            get(handlers::storage::resolve_storage_path_handler),
        )
        .route(
            "/api/compliance/export",
            post(handlers::compliance::export_handler),
        )
        .route(
            "/api/compliance/erase",
            post(handlers::compliance::erase_handler),
        )
        .route(
            "/api/compliance/rectify",
            post(handlers::compliance::rectify_handler),
        )
        .route(
            "/api/compliance/actions",
            get(handlers::compliance::list_actions_handler),
        );

    let admin_routes = Router::new()
        .route(
            "/api/admin/tenants",
            get(handlers::admin::list_tenants_handler)
                .post(handlers::admin::register_tenant_handler),
        )
        .route(
            "/api/admin/tenants/{tenant_id}",
            delete(handlers::admin::deregister_tenant_handler),
        )
        .route(
            "/api/admin/tenants/{tenant_id}/status",
            put(handlers::admin::update_tenant_status_handler),
        )
        .route(
            "/api/admin/tenants/{tenant_id}/compliance",
            put(handlers::admin::upgrade_compliance_handler),
        )
        .route(
            "/api/admin/tenants/{tenant_id}/audit",
            get(handlers::admin::list_access_entries_handler),
        )
        .route(
            "/api/admin/partitions/rebalance-plan",
            post(handlers::admin::plan_rebalance_handler),
        )
        .route(
            "/api/admin/audit/violations",
            get(handlers::admin::list_violations_handler),
        );

    let protected_routes = tenant_routes
        .merge(admin_routes)
        .route_layer(from_fn_with_state(
            app_state.clone(),
            middleware::require_gateway_auth,
        ));

    Router::new()
        .route("/health", get(handlers::health::health_handler))
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
