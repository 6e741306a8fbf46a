pub mod error;
pub mod handlers;
pub mod models;
pub mod state;

pub use state::ApiState;

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get},
};
use tower_http::catch_panic::CatchPanicLayer;

use crate::infra::http::middleware::{
    enforce_deadline, log_responses, recover_panic, set_request_context,
};

pub fn build_api_router(state: ApiState) -> Router {
    let deadline = state.request_timeout;

    Router::new()
        .route(
            "/api/v1/posts",
            get(handlers::list_posts).post(handlers::create_post),
        )
        .route(
            "/api/v1/posts/{id}",
            get(handlers::get_post).delete(handlers::delete_post),
        )
        .route(
            "/api/v1/posts/{id}/comments",
            get(handlers::list_comments).post(handlers::create_comment),
        )
        .route("/api/v1/comments/{id}", delete(handlers::delete_comment))
        .route("/api/health", get(handlers::health))
        .with_state(state)
        .layer(CatchPanicLayer::custom(recover_panic))
        .layer(axum_middleware::from_fn_with_state(
            deadline,
            enforce_deadline,
        ))
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
