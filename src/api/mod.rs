mod handlers;

use axum::{
    routing::{delete, get, patch, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::db::Database;

pub fn create_router(db: Database) -> Router {
    let api = Router::new()
        // Todos
        .route("/todos", get(handlers::list_todos))
        .route("/todos", post(handlers::create_todo))
        .route("/todos/{id}", get(handlers::get_todo))
        .route("/todos/{id}", patch(handlers::update_todo))
        .route("/todos/{id}", delete(handlers::delete_todo))
        // Notes
        .route("/notes", get(handlers::list_notes))
        .route("/notes", post(handlers::create_note))
        // Users
        .route("/users", get(handlers::list_users))
        .route("/users", post(handlers::create_user))
        // Export
        .route("/export", get(handlers::export_todos))
        // Health
        .route("/health", get(handlers::health));

    Router::new()
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(db)
}
