use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{delete, get, post, put},
    Router,
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/habits/:id/heatmap", get(handlers::heatmap_fragment))
        .route("/api/auth/register", post(handlers::register))
        .route("/api/auth/login", post(handlers::login))
        .route("/api/auth/logout", post(handlers::logout))
        .route("/api/data", get(handlers::get_data))
        .route("/api/categories", post(handlers::create_category))
        .route("/api/categories/order", put(handlers::reorder_categories))
        .route("/api/categories/:id", delete(handlers::delete_category))
        .route("/api/habits", post(handlers::create_habit))
        .route(
            "/api/habits/:id",
            put(handlers::update_habit).delete(handlers::delete_habit),
        )
        .route("/api/habits/:id/visibility", put(handlers::set_visibility))
        .route("/api/habits/:id/check-in", post(handlers::check_in))
        .route("/api/habits/:id/heatmap", get(handlers::get_heatmap))
        .route("/api/todos", post(handlers::add_todo))
        .route("/api/todos/:id", delete(handlers::delete_todo))
        .route("/api/todos/:id/toggle", post(handlers::toggle_todo))
        .route("/api/reminders", get(handlers::get_reminders))
        .route(
            "/api/preferences",
            get(handlers::get_preferences).put(handlers::put_preferences),
        )
        .route("/api/coach/analyze", post(handlers::analyze))
        .route("/api/coach/todos", post(handlers::smart_todos))
        .with_state(state)
}
