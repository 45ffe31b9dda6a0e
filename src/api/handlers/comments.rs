//! Comments on videos.

use axum::{
    Json,
    extract::{Extension, Path},
    response::IntoResponse,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;

use super::{
    auth::{Principal, utils::non_blank},
    ownership::{owned_or_reject, parse_id},
};
use crate::{
    api::{error::ApiError, response::ApiResponse},
    store::{Comment, ContentStore, Store},
};

#[derive(ToSchema, Deserialize, Default)]
#[serde(default)]
pub struct CommentContent {
    pub content: Option<String>,
}

fn required_content(payload: Option<Json<CommentContent>>) -> Result<String, ApiError> {
    payload
        .and_then(|Json(body)| non_blank(body.content.as_deref()))
        .ok_or_else(|| ApiError::validation("Comment content cannot be empty"))
}

#[utoipa::path(
    post,
    path = "/api/v1/comments/{video_id}",
    params(("video_id" = String, Path, description = "Video being commented on")),
    request_body = CommentContent,
    responses(
        (status = 201, description = "Comment added", body = Comment),
        (status = 400, description = "Empty content or invalid id"),
        (status = 404, description = "No such video")
    ),
    tag = "comments"
)]
#[instrument(skip_all)]
pub async fn add_comment(
    Extension(store): Extension<Arc<dyn Store>>,
    Extension(principal): Extension<Principal>,
    Path(video_id): Path<String>,
    payload: Option<Json<CommentContent>>,
) -> Result<impl IntoResponse, ApiError> {
    let content = required_content(payload)?;
    let video_id = parse_id(&video_id, "videoId")?;

    if store.find_video(video_id).await?.is_none() {
        return Err(ApiError::not_found("Video not found"));
    }

    let comment = store
        .insert_comment(video_id, principal.id, &content)
        .await?
        .ok_or_else(|| ApiError::not_found("Video not found"))?;
    info!(comment_id = %comment.id, %video_id, "Comment added");
    Ok(ApiResponse::created(comment, "Comment added successfully"))
}

#[utoipa::path(
    patch,
    path = "/api/v1/comments/c/{comment_id}",
    params(("comment_id" = String, Path, description = "Comment id")),
    request_body = CommentContent,
    responses(
        (status = 200, description = "Comment updated", body = Comment),
        (status = 400, description = "Empty content or invalid id"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "No such comment")
    ),
    tag = "comments"
)]
#[instrument(skip_all)]
pub async fn update_comment(
    Extension(store): Extension<Arc<dyn Store>>,
    Extension(principal): Extension<Principal>,
    Path(comment_id): Path<String>,
    payload: Option<Json<CommentContent>>,
) -> Result<impl IntoResponse, ApiError> {
    let content = required_content(payload)?;
    let comment_id = parse_id(&comment_id, "commentId")?;

    let comment = store.find_comment(comment_id).await?;
    owned_or_reject(comment, &principal, "comment", "update")?;

    let updated = store
        .update_comment(comment_id, &content)
        .await?
        .ok_or_else(|| ApiError::not_found("Comment not found"))?;
    Ok(ApiResponse::ok(updated, "Comment updated successfully"))
}

#[utoipa::path(
    delete,
    path = "/api/v1/comments/c/{comment_id}",
    params(("comment_id" = String, Path, description = "Comment id")),
    responses(
        (status = 200, description = "Comment deleted"),
        (status = 400, description = "Invalid id"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "No such comment")
    ),
    tag = "comments"
)]
#[instrument(skip_all)]
pub async fn delete_comment(
    Extension(store): Extension<Arc<dyn Store>>,
    Extension(principal): Extension<Principal>,
    Path(comment_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let comment_id = parse_id(&comment_id, "commentId")?;

    let comment = store.find_comment(comment_id).await?;
    owned_or_reject(comment, &principal, "comment", "delete")?;

    if !store.delete_comment(comment_id).await? {
        return Err(ApiError::not_found("Comment not found"));
    }
    info!(%comment_id, "Comment deleted");
    Ok(ApiResponse::ok((), "Comment deleted successfully"))
}
