//! Posts handlers

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use super::{json_body, parse_id};
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::{ListParams, PostCreateRequest};
use crate::infra::http::api::state::ApiState;

pub async fn create_post(
    State(state): State<ApiState>,
    payload: Result<Json<PostCreateRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request = json_body(payload)?;
    let post = state.posts.create_post(request.into()).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn list_posts(
    State(state): State<ApiState>,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let list = state.posts.list_posts(params.post_list_query()).await?;
    Ok(Json(list))
}

pub async fn get_post(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id, "post id")?;
    let post = state.posts.get_post(id).await?;
    Ok(Json(post))
}

pub async fn delete_post(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id, "post id")?;
    state.posts.delete_post(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
