//! Videos: metadata for media uploaded elsewhere.

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
    store::{ContentStore, NewVideo, Store, Video, VideoPatch},
};

#[derive(ToSchema, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct PublishVideo {
    pub title: Option<String>,
    pub description: Option<String>,
    /// Media URL of the already-uploaded file.
    pub video_file: Option<String>,
    pub thumbnail: Option<String>,
    /// Seconds; defaults to 0.
    pub duration: Option<f64>,
}

#[derive(ToSchema, Deserialize, Default)]
#[serde(default)]
pub struct UpdateVideo {
    pub title: Option<String>,
    pub description: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/v1/videos",
    request_body = PublishVideo,
    responses(
        (status = 201, description = "Video published", body = Video),
        (status = 400, description = "Missing or invalid fields")
    ),
    tag = "videos"
)]
#[instrument(skip_all)]
pub async fn publish_video(
    Extension(store): Extension<Arc<dyn Store>>,
    Extension(principal): Extension<Principal>,
    payload: Option<Json<PublishVideo>>,
) -> Result<impl IntoResponse, ApiError> {
    let request = payload.map(|Json(request)| request).unwrap_or_default();

    let (Some(title), Some(description)) = (
        non_blank(request.title.as_deref()),
        non_blank(request.description.as_deref()),
    ) else {
        return Err(ApiError::validation("Title and description are required"));
    };
    let (Some(video_file), Some(thumbnail)) = (
        non_blank(request.video_file.as_deref()),
        non_blank(request.thumbnail.as_deref()),
    ) else {
        return Err(ApiError::validation("Video file and thumbnail are required"));
    };
    let duration = request.duration.unwrap_or_default();
    if !duration.is_finite() || duration < 0.0 {
        return Err(ApiError::validation("Invalid duration"));
    }

    let video = store
        .insert_video(NewVideo {
            owner: principal.id,
            video_file,
            thumbnail,
            title,
            description,
            duration,
        })
        .await?;
    info!(video_id = %video.id, owner = %principal.id, "Video published");
    Ok(ApiResponse::created(video, "Video published successfully"))
}

#[utoipa::path(
    get,
    path = "/api/v1/videos/{video_id}",
    params(("video_id" = String, Path, description = "Video id")),
    responses(
        (status = 200, description = "The video", body = Video),
        (status = 400, description = "Invalid id"),
        (status = 404, description = "No such video")
    ),
    tag = "videos"
)]
pub async fn get_video(
    Extension(store): Extension<Arc<dyn Store>>,
    Path(video_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let video_id = parse_id(&video_id, "videoId")?;
    let video = store
        .find_video(video_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Video not found"))?;
    Ok(ApiResponse::ok(video, "Video fetched successfully"))
}

#[utoipa::path(
    patch,
    path = "/api/v1/videos/{video_id}",
    params(("video_id" = String, Path, description = "Video id")),
    request_body = UpdateVideo,
    responses(
        (status = 200, description = "Video updated", body = Video),
        (status = 400, description = "Nothing to update or invalid id"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "No such video")
    ),
    tag = "videos"
)]
#[instrument(skip_all)]
pub async fn update_video(
    Extension(store): Extension<Arc<dyn Store>>,
    Extension(principal): Extension<Principal>,
    Path(video_id): Path<String>,
    payload: Option<Json<UpdateVideo>>,
) -> Result<impl IntoResponse, ApiError> {
    let video_id = parse_id(&video_id, "videoId")?;
    let request = payload.map(|Json(request)| request).unwrap_or_default();
    let patch = VideoPatch {
        title: non_blank(request.title.as_deref()),
        description: non_blank(request.description.as_deref()),
    };
    if patch.title.is_none() && patch.description.is_none() {
        return Err(ApiError::validation("Title or description is required"));
    }

    let video = store.find_video(video_id).await?;
    owned_or_reject(video, &principal, "video", "update")?;

    let updated = store
        .update_video(video_id, &patch)
        .await?
        .ok_or_else(|| ApiError::not_found("Video not found"))?;
    Ok(ApiResponse::ok(updated, "Video updated successfully"))
}

#[utoipa::path(
    delete,
    path = "/api/v1/videos/{video_id}",
    params(("video_id" = String, Path, description = "Video id")),
    responses(
        (status = 200, description = "Video and its comments deleted"),
        (status = 400, description = "Invalid id"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "No such video")
    ),
    tag = "videos"
)]
#[instrument(skip_all)]
pub async fn delete_video(
    Extension(store): Extension<Arc<dyn Store>>,
    Extension(principal): Extension<Principal>,
    Path(video_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let video_id = parse_id(&video_id, "videoId")?;

    let video = store.find_video(video_id).await?;
    owned_or_reject(video, &principal, "video", "delete")?;

    if !store.delete_video(video_id).await? {
        return Err(ApiError::not_found("Video not found"));
    }
    info!(%video_id, "Video deleted");
    Ok(ApiResponse::ok((), "Video deleted successfully"))
}

#[utoipa::path(
    patch,
    path = "/api/v1/videos/toggle/publish/{video_id}",
    params(("video_id" = String, Path, description = "Video id")),
    responses(
        (status = 200, description = "Publish status flipped", body = Video),
        (status = 400, description = "Invalid id"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "No such video")
    ),
    tag = "videos"
)]
#[instrument(skip_all)]
pub async fn toggle_publish_status(
    Extension(store): Extension<Arc<dyn Store>>,
    Extension(principal): Extension<Principal>,
    Path(video_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let video_id = parse_id(&video_id, "videoId")?;

    let video = store.find_video(video_id).await?;
    owned_or_reject(video, &principal, "video", "update")?;

    let toggled = store
        .toggle_video_published(video_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Video not found"))?;
    info!(%video_id, is_published = toggled.is_published, "Publish status toggled");
    Ok(ApiResponse::ok(toggled, "Publish status updated successfully"))
}
