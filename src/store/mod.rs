//! Storage contracts for accounts and owned content.
//!
//! Handlers only talk to the store through these traits. Two implementations
//! exist: [`postgres::PgStore`] for deployments and [`memory::MemoryStore`] for
//! tests and local runs without a database.
//!
//! Session truth is the `refresh_token` column of the account. It is written in
//! two ways only: [`AccountStore::replace_refresh_token`] overwrites it (login,
//! logout) and [`AccountStore::swap_refresh_token`] replaces it only if it still
//! holds the presented value (rotation). Implementations must perform the swap
//! as a single atomic conditional write.

pub mod memory;
pub mod models;
pub mod postgres;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

pub use models::{
    Account, Comment, CreateAccountOutcome, NewAccount, NewVideo, Tweet, Video, VideoPatch,
};

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_account_by_id(&self, id: Uuid) -> Result<Option<Account>>;

    /// Match on username or email; `None` arguments never match.
    async fn find_account_by_username_or_email(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<Account>>;

    async fn create_account(&self, account: NewAccount) -> Result<CreateAccountOutcome>;

    /// Returns `false` if the account does not exist.
    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> Result<bool>;

    /// Unconditionally overwrite the stored refresh token (`None` clears it).
    /// Returns `false` if the account does not exist.
    async fn replace_refresh_token(&self, id: Uuid, token: Option<&str>) -> Result<bool>;

    /// Replace the stored refresh token with `next` only if it currently equals
    /// `expected`. Returns `false` when the stored value differs or the account
    /// is gone.
    async fn swap_refresh_token(&self, id: Uuid, expected: &str, next: &str) -> Result<bool>;
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// `None` when the video is gone by the time the comment is written.
    async fn insert_comment(
        &self,
        video: Uuid,
        owner: Uuid,
        content: &str,
    ) -> Result<Option<Comment>>;
    async fn find_comment(&self, id: Uuid) -> Result<Option<Comment>>;
    async fn update_comment(&self, id: Uuid, content: &str) -> Result<Option<Comment>>;
    async fn delete_comment(&self, id: Uuid) -> Result<bool>;

    async fn insert_tweet(&self, owner: Uuid, content: &str) -> Result<Tweet>;
    async fn find_tweet(&self, id: Uuid) -> Result<Option<Tweet>>;
    /// Newest first.
    async fn list_tweets_by_owner(&self, owner: Uuid) -> Result<Vec<Tweet>>;
    async fn update_tweet(&self, id: Uuid, content: &str) -> Result<Option<Tweet>>;
    async fn delete_tweet(&self, id: Uuid) -> Result<bool>;

    async fn insert_video(&self, video: NewVideo) -> Result<Video>;
    async fn find_video(&self, id: Uuid) -> Result<Option<Video>>;
    async fn update_video(&self, id: Uuid, patch: &VideoPatch) -> Result<Option<Video>>;
    /// Deleting a video also deletes its comments.
    async fn delete_video(&self, id: Uuid) -> Result<bool>;
    async fn toggle_video_published(&self, id: Uuid) -> Result<Option<Video>>;
}

/// Everything the API needs from persistence.
#[async_trait]
pub trait Store: AccountStore + ContentStore {
    /// Cheap liveness check used by `/health`.
    async fn ping(&self) -> Result<()>;
}
