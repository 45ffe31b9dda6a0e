//! Tweets: short text posts owned by an account.

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
    store::{AccountStore, ContentStore, Store, Tweet},
};

#[derive(ToSchema, Deserialize, Default)]
#[serde(default)]
pub struct TweetContent {
    pub content: Option<String>,
}

fn required_content(payload: Option<Json<TweetContent>>) -> Result<String, ApiError> {
    payload
        .and_then(|Json(body)| non_blank(body.content.as_deref()))
        .ok_or_else(|| ApiError::validation("Tweet content cannot be empty"))
}

#[utoipa::path(
    post,
    path = "/api/v1/tweets",
    request_body = TweetContent,
    responses(
        (status = 201, description = "Tweet created", body = Tweet),
        (status = 400, description = "Empty content"),
        (status = 401, description = "Not authenticated")
    ),
    tag = "tweets"
)]
#[instrument(skip_all)]
pub async fn create_tweet(
    Extension(store): Extension<Arc<dyn Store>>,
    Extension(principal): Extension<Principal>,
    payload: Option<Json<TweetContent>>,
) -> Result<impl IntoResponse, ApiError> {
    let content = required_content(payload)?;
    let tweet = store.insert_tweet(principal.id, &content).await?;
    info!(tweet_id = %tweet.id, owner = %principal.id, "Tweet created");
    Ok(ApiResponse::created(tweet, "Tweet created successfully"))
}

#[utoipa::path(
    get,
    path = "/api/v1/tweets/user/{user_id}",
    params(("user_id" = String, Path, description = "Account whose tweets to list")),
    responses(
        (status = 200, description = "Tweets, newest first", body = [Tweet]),
        (status = 400, description = "Invalid id"),
        (status = 404, description = "No such user")
    ),
    tag = "tweets"
)]
pub async fn get_user_tweets(
    Extension(store): Extension<Arc<dyn Store>>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = parse_id(&user_id, "userId")?;
    if store.find_account_by_id(user_id).await?.is_none() {
        return Err(ApiError::not_found("User not found"));
    }
    let tweets = store.list_tweets_by_owner(user_id).await?;
    Ok(ApiResponse::ok(tweets, "User tweets fetched successfully"))
}

#[utoipa::path(
    patch,
    path = "/api/v1/tweets/{tweet_id}",
    params(("tweet_id" = String, Path, description = "Tweet id")),
    request_body = TweetContent,
    responses(
        (status = 200, description = "Tweet updated", body = Tweet),
        (status = 400, description = "Empty content or invalid id"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "No such tweet")
    ),
    tag = "tweets"
)]
#[instrument(skip_all)]
pub async fn update_tweet(
    Extension(store): Extension<Arc<dyn Store>>,
    Extension(principal): Extension<Principal>,
    Path(tweet_id): Path<String>,
    payload: Option<Json<TweetContent>>,
) -> Result<impl IntoResponse, ApiError> {
    let content = required_content(payload)?;
    let tweet_id = parse_id(&tweet_id, "tweetId")?;

    let tweet = store.find_tweet(tweet_id).await?;
    owned_or_reject(tweet, &principal, "tweet", "update")?;

    let updated = store
        .update_tweet(tweet_id, &content)
        .await?
        .ok_or_else(|| ApiError::not_found("Tweet not found"))?;
    Ok(ApiResponse::ok(updated, "Tweet updated successfully"))
}

#[utoipa::path(
    delete,
    path = "/api/v1/tweets/{tweet_id}",
    params(("tweet_id" = String, Path, description = "Tweet id")),
    responses(
        (status = 200, description = "Tweet deleted"),
        (status = 400, description = "Invalid id"),
        (status = 403, description = "Not the owner"),
        (status = 404, description = "No such tweet")
    ),
    tag = "tweets"
)]
#[instrument(skip_all)]
pub async fn delete_tweet(
    Extension(store): Extension<Arc<dyn Store>>,
    Extension(principal): Extension<Principal>,
    Path(tweet_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let tweet_id = parse_id(&tweet_id, "tweetId")?;

    let tweet = store.find_tweet(tweet_id).await?;
    owned_or_reject(tweet, &principal, "tweet", "delete")?;

    if !store.delete_tweet(tweet_id).await? {
        return Err(ApiError::not_found("Tweet not found"));
    }
    info!(%tweet_id, "Tweet deleted");
    Ok(ApiResponse::ok((), "Tweet deleted successfully"))
}
