//! In-process store backed by `RwLock`ed maps.
//!
//! Used by the test-suite and when the server starts without `--dsn`. Nothing
//! survives a restart.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    Account, AccountStore, Comment, ContentStore, CreateAccountOutcome, NewAccount, NewVideo,
    Store, Tweet, Video, VideoPatch,
};

#[derive(Debug, Default)]
pub struct MemoryStore {
    accounts: RwLock<HashMap<Uuid, Account>>,
    comments: RwLock<HashMap<Uuid, Comment>>,
    tweets: RwLock<HashMap<Uuid, Tweet>>,
    videos: RwLock<HashMap<Uuid, Video>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn find_account_by_id(&self, id: Uuid) -> Result<Option<Account>> {
        Ok(self.accounts.read().await.get(&id).cloned())
    }

    async fn find_account_by_username_or_email(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<Account>> {
        let accounts = self.accounts.read().await;
        Ok(accounts
            .values()
            .find(|account| {
                username.is_some_and(|u| account.username == u)
                    || email.is_some_and(|e| account.email == e)
            })
            .cloned())
    }

    async fn create_account(&self, account: NewAccount) -> Result<CreateAccountOutcome> {
        let mut accounts = self.accounts.write().await;
        let duplicate = accounts.values().any(|existing| {
            existing.username == account.username || existing.email == account.email
        });
        if duplicate {
            return Ok(CreateAccountOutcome::Conflict);
        }

        let now = Utc::now();
        let created = Account {
            id: Uuid::now_v7(),
            username: account.username,
            email: account.email,
            full_name: account.full_name,
            avatar: account.avatar,
            cover_image: account.cover_image,
            password_hash: account.password_hash,
            refresh_token: None,
            created_at: now,
            updated_at: now,
        };
        accounts.insert(created.id, created.clone());
        Ok(CreateAccountOutcome::Created(created))
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> Result<bool> {
        let mut accounts = self.accounts.write().await;
        let Some(account) = accounts.get_mut(&id) else {
            return Ok(false);
        };
        account.password_hash = password_hash.to_string();
        account.updated_at = Utc::now();
        Ok(true)
    }

    async fn replace_refresh_token(&self, id: Uuid, token: Option<&str>) -> Result<bool> {
        let mut accounts = self.accounts.write().await;
        let Some(account) = accounts.get_mut(&id) else {
            return Ok(false);
        };
        account.refresh_token = token.map(str::to_string);
        account.updated_at = Utc::now();
        Ok(true)
    }

    async fn swap_refresh_token(&self, id: Uuid, expected: &str, next: &str) -> Result<bool> {
        // Compare and write under one guard.
        let mut accounts = self.accounts.write().await;
        let Some(account) = accounts.get_mut(&id) else {
            return Ok(false);
        };
        if account.refresh_token.as_deref() != Some(expected) {
            return Ok(false);
        }
        account.refresh_token = Some(next.to_string());
        account.updated_at = Utc::now();
        Ok(true)
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn insert_comment(
        &self,
        video: Uuid,
        owner: Uuid,
        content: &str,
    ) -> Result<Option<Comment>> {
        // Lock order is videos, then comments (same as delete_video).
        let videos = self.videos.read().await;
        if !videos.contains_key(&video) {
            return Ok(None);
        }
        let now = Utc::now();
        let comment = Comment {
            id: Uuid::now_v7(),
            content: content.to_string(),
            video,
            owner,
            created_at: now,
            updated_at: now,
        };
        self.comments
            .write()
            .await
            .insert(comment.id, comment.clone());
        drop(videos);
        Ok(Some(comment))
    }

    async fn find_comment(&self, id: Uuid) -> Result<Option<Comment>> {
        Ok(self.comments.read().await.get(&id).cloned())
    }

    async fn update_comment(&self, id: Uuid, content: &str) -> Result<Option<Comment>> {
        let mut comments = self.comments.write().await;
        Ok(comments.get_mut(&id).map(|comment| {
            comment.content = content.to_string();
            comment.updated_at = Utc::now();
            comment.clone()
        }))
    }

    async fn delete_comment(&self, id: Uuid) -> Result<bool> {
        Ok(self.comments.write().await.remove(&id).is_some())
    }

    async fn insert_tweet(&self, owner: Uuid, content: &str) -> Result<Tweet> {
        let now = Utc::now();
        let tweet = Tweet {
            id: Uuid::now_v7(),
            content: content.to_string(),
            owner,
            created_at: now,
            updated_at: now,
        };
        self.tweets.write().await.insert(tweet.id, tweet.clone());
        Ok(tweet)
    }

    async fn find_tweet(&self, id: Uuid) -> Result<Option<Tweet>> {
        Ok(self.tweets.read().await.get(&id).cloned())
    }

    async fn list_tweets_by_owner(&self, owner: Uuid) -> Result<Vec<Tweet>> {
        let mut tweets: Vec<Tweet> = self
            .tweets
            .read()
            .await
            .values()
            .filter(|tweet| tweet.owner == owner)
            .cloned()
            .collect();
        // v7 ids sort by creation time.
        tweets.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(tweets)
    }

    async fn update_tweet(&self, id: Uuid, content: &str) -> Result<Option<Tweet>> {
        let mut tweets = self.tweets.write().await;
        Ok(tweets.get_mut(&id).map(|tweet| {
            tweet.content = content.to_string();
            tweet.updated_at = Utc::now();
            tweet.clone()
        }))
    }

    async fn delete_tweet(&self, id: Uuid) -> Result<bool> {
        Ok(self.tweets.write().await.remove(&id).is_some())
    }

    async fn insert_video(&self, video: NewVideo) -> Result<Video> {
        let now = Utc::now();
        let video = Video {
            id: Uuid::now_v7(),
            video_file: video.video_file,
            thumbnail: video.thumbnail,
            title: video.title,
            description: video.description,
            duration: video.duration,
            views: 0,
            is_published: true,
            owner: video.owner,
            created_at: now,
            updated_at: now,
        };
        self.videos.write().await.insert(video.id, video.clone());
        Ok(video)
    }

    async fn find_video(&self, id: Uuid) -> Result<Option<Video>> {
        Ok(self.videos.read().await.get(&id).cloned())
    }

    async fn update_video(&self, id: Uuid, patch: &VideoPatch) -> Result<Option<Video>> {
        let mut videos = self.videos.write().await;
        Ok(videos.get_mut(&id).map(|video| {
            if let Some(title) = &patch.title {
                video.title.clone_from(title);
            }
            if let Some(description) = &patch.description {
                video.description.clone_from(description);
            }
            video.updated_at = Utc::now();
            video.clone()
        }))
    }

    async fn delete_video(&self, id: Uuid) -> Result<bool> {
        let mut videos = self.videos.write().await;
        let removed = videos.remove(&id).is_some();
        if removed {
            self.comments
                .write()
                .await
                .retain(|_, comment| comment.video != id);
        }
        drop(videos);
        Ok(removed)
    }

    async fn toggle_video_published(&self, id: Uuid) -> Result<Option<Video>> {
        let mut videos = self.videos.write().await;
        Ok(videos.get_mut(&id).map(|video| {
            video.is_published = !video.is_published;
            video.updated_at = Utc::now();
            video.clone()
        }))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, bail};
    use std::sync::Arc;

    fn new_account(username: &str, email: &str) -> NewAccount {
        NewAccount {
            username: username.to_string(),
            email: email.to_string(),
            full_name: "Test User".to_string(),
            password_hash: "hash".to_string(),
            avatar: None,
            cover_image: None,
        }
    }

    async fn create(store: &MemoryStore, username: &str, email: &str) -> Result<Account> {
        match store.create_account(new_account(username, email)).await? {
            CreateAccountOutcome::Created(account) => Ok(account),
            CreateAccountOutcome::Conflict => bail!("unexpected conflict"),
        }
    }

    #[tokio::test]
    async fn create_account_rejects_duplicate_username_or_email() -> Result<()> {
        let store = MemoryStore::new();
        create(&store, "alice", "alice@x.com").await?;

        let same_username = store
            .create_account(new_account("alice", "other@x.com"))
            .await?;
        assert!(matches!(same_username, CreateAccountOutcome::Conflict));

        let same_email = store
            .create_account(new_account("bob", "alice@x.com"))
            .await?;
        assert!(matches!(same_email, CreateAccountOutcome::Conflict));
        Ok(())
    }

    #[tokio::test]
    async fn lookup_by_username_or_email() -> Result<()> {
        let store = MemoryStore::new();
        let alice = create(&store, "alice", "alice@x.com").await?;

        let by_username = store
            .find_account_by_username_or_email(Some("alice"), None)
            .await?
            .context("missing by username")?;
        assert_eq!(by_username.id, alice.id);

        let by_email = store
            .find_account_by_username_or_email(None, Some("alice@x.com"))
            .await?
            .context("missing by email")?;
        assert_eq!(by_email.id, alice.id);

        assert!(
            store
                .find_account_by_username_or_email(None, None)
                .await?
                .is_none()
        );
        Ok(())
    }

    #[tokio::test]
    async fn swap_refresh_token_only_matches_current_value() -> Result<()> {
        let store = MemoryStore::new();
        let alice = create(&store, "alice", "alice@x.com").await?;

        // Nothing stored yet.
        assert!(!store.swap_refresh_token(alice.id, "a", "b").await?);

        assert!(store.replace_refresh_token(alice.id, Some("a")).await?);
        assert!(store.swap_refresh_token(alice.id, "a", "b").await?);
        assert!(!store.swap_refresh_token(alice.id, "a", "c").await?);

        let stored = store
            .find_account_by_id(alice.id)
            .await?
            .context("missing account")?;
        assert_eq!(stored.refresh_token.as_deref(), Some("b"));

        assert!(store.replace_refresh_token(alice.id, None).await?);
        assert!(!store.swap_refresh_token(alice.id, "b", "c").await?);
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_swaps_have_a_single_winner() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        let alice = create(&store, "alice", "alice@x.com").await?;
        store.replace_refresh_token(alice.id, Some("seed")).await?;

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .swap_refresh_token(alice.id, "seed", &format!("next-{i}"))
                    .await
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await?? {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        Ok(())
    }

    #[tokio::test]
    async fn delete_video_removes_its_comments() -> Result<()> {
        let store = MemoryStore::new();
        let owner = Uuid::now_v7();
        let video = store
            .insert_video(NewVideo {
                owner,
                video_file: "v".to_string(),
                thumbnail: "t".to_string(),
                title: "title".to_string(),
                description: "description".to_string(),
                duration: 1.0,
            })
            .await?;
        let comment = store
            .insert_comment(video.id, owner, "hi")
            .await?
            .context("video missing")?;

        assert!(store.delete_video(video.id).await?);
        assert!(store.find_comment(comment.id).await?.is_none());
        assert!(!store.delete_video(video.id).await?);
        assert!(
            store
                .insert_comment(video.id, owner, "late")
                .await?
                .is_none()
        );
        Ok(())
    }

    #[tokio::test]
    async fn tweets_by_owner_are_newest_first() -> Result<()> {
        let store = MemoryStore::new();
        let alice = Uuid::now_v7();
        let bob = Uuid::now_v7();
        let first = store.insert_tweet(alice, "first").await?;
        store.insert_tweet(bob, "not alice").await?;
        let second = store.insert_tweet(alice, "second").await?;

        let tweets = store.list_tweets_by_owner(alice).await?;
        let ids: Vec<Uuid> = tweets.iter().map(|tweet| tweet.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
        assert!(store.list_tweets_by_owner(Uuid::now_v7()).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn toggle_video_published_flips_flag() -> Result<()> {
        let store = MemoryStore::new();
        let video = store
            .insert_video(NewVideo {
                owner: Uuid::now_v7(),
                video_file: "v".to_string(),
                thumbnail: "t".to_string(),
                title: "title".to_string(),
                description: "description".to_string(),
                duration: 1.0,
            })
            .await?;
        assert!(video.is_published);

        let toggled = store
            .toggle_video_published(video.id)
            .await?
            .context("missing video")?;
        assert!(!toggled.is_published);
        assert!(store.toggle_video_published(Uuid::now_v7()).await?.is_none());
        Ok(())
    }
}
