use std::sync::Arc;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::common::di::AppState;
use crate::interfaces::api::handlers::auth_handler::auth_routes;

/// Creates API routes for the application
pub fn create_api_routes(app_state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api/auth", auth_routes(app_state.clone()))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
