use axum::{
    routing::{get, post},
    Router,
};

use crate::api::handlers::{self, AppState};
use crate::config::Environment;
use crate::store::PersistenceStore;

pub fn create_router<S: PersistenceStore>(environment: Environment) -> Router<AppState<S>> {
    let router = Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // User management
        .route(
            "/api/user",
            post(handlers::create_user::<S>).get(handlers::list_users::<S>),
        )
        .route(
            "/api/user/:id",
            get(handlers::get_user::<S>)
                .patch(handlers::update_user::<S>)
                .delete(handlers::delete_user::<S>),
        );

    // API Documentation is only served in development
    if environment.is_development() {
        router
            .route("/docs", get(handlers::get_api_docs))
            .route("/docs/openapi.json", get(handlers::get_openapi_spec))
    } else {
        router
    }
}
