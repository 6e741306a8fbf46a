//! Comments handlers

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use super::{json_body, parse_id};
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::{CommentCreateRequest, ListParams};
use crate::infra::http::api::state::ApiState;

pub async fn create_comment(
    State(state): State<ApiState>,
    Path(post_id): Path<String>,
    payload: Result<Json<CommentCreateRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let post_id = parse_id(&post_id, "post id")?;
    let request = json_body(payload)?;
    let comment = state
        .comments
        .create_comment(request.into_new_comment(post_id))
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn list_comments(
    State(state): State<ApiState>,
    Path(post_id): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let post_id = parse_id(&post_id, "post id")?;
    let parent_id = params
        .parent()
        .map_err(|raw| ApiError::bad_request("invalid parent id", Some(raw)))?;

    let tree = state
        .comments
        .get_comments(params.comment_page_query(post_id, parent_id))
        .await?;
    Ok(Json(tree))
}

pub async fn delete_comment(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id, "comment id")?;
    state.comments.delete_comment(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
