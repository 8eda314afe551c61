//! API Router configuration

use super::handlers;
use super::middleware::{authenticate, present_errors};
use super::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

fn mount(router: Router<AppState>, path: &str, inner: Router<AppState>) -> Router<AppState> {
    if path.is_empty() {
        router.merge(inner)
    } else {
        router.nest(path, inner)
    }
}

/// Create the admin router mounted under `{base_path}`
pub fn create_router(state: AppState) -> Router {
    let config = state.admin.config().clone();

    let api_routes = Router::new()
        .route("/navigation", get(handlers::get_navigation))
        .route("/search", get(handlers::search))
        // Commands
        .route("/commands", get(handlers::list_commands))
        .route("/commands/:name", post(handlers::execute_command))
        // Features
        .route(
            "/features/:key",
            get(handlers::get_feature)
                .put(handlers::set_feature)
                .delete(handlers::unset_feature),
        )
        // Dashboard
        .route("/dashboard", get(handlers::get_dashboard))
        .route(
            "/dashboard/preferences",
            get(handlers::get_dashboard_preferences).post(handlers::save_dashboard_preferences),
        )
        // Workflows
        .route(
            "/workflows",
            get(handlers::list_workflows).post(handlers::create_workflow),
        )
        .route("/workflows/resolve", get(handlers::resolve_binding))
        .route(
            "/workflows/bindings",
            get(handlers::list_bindings).post(handlers::create_binding),
        )
        .route(
            "/workflows/bindings/:id",
            get(handlers::get_binding)
                .put(handlers::update_binding)
                .delete(handlers::delete_binding),
        )
        .route(
            "/workflows/:id",
            get(handlers::get_workflow).put(handlers::update_workflow),
        )
        .route("/workflows/:id/revisions", get(handlers::list_workflow_revisions))
        .route(
            "/workflows/:id/revisions/:version",
            get(handlers::get_workflow_revision),
        )
        // Translation queue
        .route(
            "/translations/assignments",
            get(handlers::list_assignments).post(handlers::create_assignment),
        )
        .route(
            "/translations/assignments/bulk/:op",
            post(handlers::run_bulk_assignment_operation),
        )
        .route("/translations/assignments/:id", get(handlers::get_assignment))
        .route(
            "/translations/assignments/:id/:op",
            post(handlers::run_assignment_operation),
        )
        // Panels
        .route("/panels", get(handlers::list_panels))
        .route(
            "/:panel",
            get(handlers::list_records).post(handlers::create_record),
        )
        .route("/:panel/actions/:action", post(handlers::run_action))
        .route("/:panel/bulk/:action", post(handlers::run_bulk_action))
        .route(
            "/:panel/:id",
            get(handlers::get_record)
                .put(handlers::update_record)
                .delete(handlers::delete_record),
        )
        .route("/:panel/:id/actions", get(handlers::record_actions));

    let admin_routes = mount(
        Router::new()
            .route("/health", get(handlers::health_check))
            .route("/metrics", get(handlers::metrics)),
        &config.api_path(),
        api_routes,
    );

    // Build router with middleware; the presenter sits outermost so it sees
    // authentication failures too
    let mut router = mount(Router::new(), &config.base(), admin_routes)
        .layer(DefaultBodyLimit::max(config.server.max_body_size))
        .layer(from_fn_with_state(state.clone(), authenticate))
        .layer(from_fn_with_state(state.clone(), present_errors))
        .layer(TimeoutLayer::new(Duration::from_secs(config.server.request_timeout_secs)))
        .layer(TraceLayer::new_for_http());

    if config.server.enable_cors {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    router.with_state(state)
}
