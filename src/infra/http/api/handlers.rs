mod comments;
mod health;
mod posts;

pub use comments::{create_comment, delete_comment, list_comments};
pub use health::health;
pub use posts::{create_post, delete_post, get_post, list_posts};

use axum::Json;
use axum::extract::rejection::JsonRejection;

use super::error::ApiError;

/// Path ids arrive as text so a malformed id gets the JSON error envelope.
fn parse_id(raw: &str, what: &'static str) -> Result<i64, ApiError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| ApiError::bad_request(format!("invalid {what}"), Some(raw.to_string())))
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::bad_request("invalid request body", Some(rejection.body_text())))
}
