//! PostgreSQL store (sqlx).

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{
    Connection, PgPool, Row,
    postgres::{PgPoolOptions, PgRow},
};
use std::time::Duration;
use tracing::{Instrument, Span};
use uuid::Uuid;

use super::{
    Account, AccountStore, Comment, ContentStore, CreateAccountOutcome, NewAccount, NewVideo,
    Store, Tweet, Video, VideoPatch,
};

const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

const ACCOUNT_COLUMNS: &str = "id, username, email, full_name, avatar, cover_image, \
     password_hash, refresh_token, created_at, updated_at";
const VIDEO_COLUMNS: &str = "id, owner_id, video_file, thumbnail, title, description, \
     duration, views, is_published, created_at, updated_at";
const COMMENT_COLUMNS: &str = "id, content, video_id, owner_id, created_at, updated_at";
const TWEET_COLUMNS: &str = "id, content, owner_id, created_at, updated_at";

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect a pool to `dsn`.
    ///
    /// # Errors
    /// Returns an error if the database is unreachable.
    pub async fn connect(dsn: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(5)
            .max_lifetime(Duration::from_secs(60 * 2))
            .test_before_acquire(true)
            .connect(dsn)
            .await
            .context("Failed to connect to database")?;
        Ok(Self { pool })
    }

    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply `sql/schema.sql`; every statement is idempotent.
    ///
    /// # Errors
    /// Returns an error if any statement fails.
    pub async fn apply_schema(&self) -> Result<()> {
        let mut connection = self
            .pool
            .acquire()
            .await
            .context("failed to acquire connection for schema setup")?;

        for (index, statement) in split_sql_statements(SCHEMA_SQL).iter().enumerate() {
            sqlx::query(statement)
                .execute(&mut *connection)
                .await
                .with_context(|| format!("failed to execute schema statement {}", index + 1))?;
        }

        Ok(())
    }
}

fn query_span(operation: &'static str, statement: &str) -> Span {
    tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("--") {
            continue;
        }
        current.push_str(line);
        current.push('\n');

        if trimmed.ends_with(';') {
            let statement = current.trim();
            if !statement.is_empty() {
                statements.push(statement.to_string());
            }
            current.clear();
        }
    }

    let leftover = current.trim();
    if !leftover.is_empty() {
        statements.push(leftover.to_string());
    }

    statements
}

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

fn has_sqlstate(err: &sqlx::Error, sqlstate: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code == sqlstate),
        _ => false,
    }
}

fn account_from_row(row: &PgRow) -> Result<Account> {
    Ok(Account {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        full_name: row.try_get("full_name")?,
        avatar: row.try_get("avatar")?,
        cover_image: row.try_get("cover_image")?,
        password_hash: row.try_get("password_hash")?,
        refresh_token: row.try_get("refresh_token")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn comment_from_row(row: &PgRow) -> Result<Comment> {
    Ok(Comment {
        id: row.try_get("id")?,
        content: row.try_get("content")?,
        video: row.try_get("video_id")?,
        owner: row.try_get("owner_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn tweet_from_row(row: &PgRow) -> Result<Tweet> {
    Ok(Tweet {
        id: row.try_get("id")?,
        content: row.try_get("content")?,
        owner: row.try_get("owner_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn video_from_row(row: &PgRow) -> Result<Video> {
    Ok(Video {
        id: row.try_get("id")?,
        video_file: row.try_get("video_file")?,
        thumbnail: row.try_get("thumbnail")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        duration: row.try_get("duration")?,
        views: row.try_get("views")?,
        is_published: row.try_get("is_published")?,
        owner: row.try_get("owner_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl AccountStore for PgStore {
    async fn find_account_by_id(&self, id: Uuid) -> Result<Option<Account>> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await
            .context("failed to lookup account by id")?;
        row.as_ref().map(account_from_row).transpose()
    }

    async fn find_account_by_username_or_email(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<Account>> {
        if username.is_none() && email.is_none() {
            return Ok(None);
        }
        let query = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE username = $1 OR email = $2 LIMIT 1"
        );
        let row = sqlx::query(&query)
            .bind(username)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await
            .context("failed to lookup account by username or email")?;
        row.as_ref().map(account_from_row).transpose()
    }

    async fn create_account(&self, account: NewAccount) -> Result<CreateAccountOutcome> {
        let query = format!(
            r"
            INSERT INTO accounts
                (id, username, email, full_name, avatar, cover_image, password_hash)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {ACCOUNT_COLUMNS}
            "
        );
        let result = sqlx::query(&query)
            .bind(Uuid::now_v7())
            .bind(&account.username)
            .bind(&account.email)
            .bind(&account.full_name)
            .bind(&account.avatar)
            .bind(&account.cover_image)
            .bind(&account.password_hash)
            .fetch_one(&self.pool)
            .instrument(query_span("INSERT", &query))
            .await;

        match result {
            Ok(row) => Ok(CreateAccountOutcome::Created(account_from_row(&row)?)),
            Err(err) if has_sqlstate(&err, UNIQUE_VIOLATION) => Ok(CreateAccountOutcome::Conflict),
            Err(err) => Err(err).context("failed to insert account"),
        }
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> Result<bool> {
        let query = "UPDATE accounts SET password_hash = $2, updated_at = NOW() WHERE id = $1";
        let result = sqlx::query(query)
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .context("failed to update password hash")?;
        Ok(result.rows_affected() == 1)
    }

    async fn replace_refresh_token(&self, id: Uuid, token: Option<&str>) -> Result<bool> {
        let query = "UPDATE accounts SET refresh_token = $2, updated_at = NOW() WHERE id = $1";
        let result = sqlx::query(query)
            .bind(id)
            .bind(token)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .context("failed to replace refresh token")?;
        Ok(result.rows_affected() == 1)
    }

    async fn swap_refresh_token(&self, id: Uuid, expected: &str, next: &str) -> Result<bool> {
        // Single conditional UPDATE: concurrent callers presenting the same token
        // serialize on the row lock and only the first one still matches.
        let query = r"
            UPDATE accounts
            SET refresh_token = $3, updated_at = NOW()
            WHERE id = $1 AND refresh_token = $2
        ";
        let result = sqlx::query(query)
            .bind(id)
            .bind(expected)
            .bind(next)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .context("failed to rotate refresh token")?;
        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl ContentStore for PgStore {
    async fn insert_comment(
        &self,
        video: Uuid,
        owner: Uuid,
        content: &str,
    ) -> Result<Option<Comment>> {
        let query = format!(
            "INSERT INTO comments (id, content, video_id, owner_id) VALUES ($1, $2, $3, $4) \
             RETURNING {COMMENT_COLUMNS}"
        );
        let result = sqlx::query(&query)
            .bind(Uuid::now_v7())
            .bind(content)
            .bind(video)
            .bind(owner)
            .fetch_one(&self.pool)
            .instrument(query_span("INSERT", &query))
            .await;

        match result {
            Ok(row) => comment_from_row(&row).map(Some),
            // The video was deleted after the handler looked it up.
            Err(err) if has_sqlstate(&err, FOREIGN_KEY_VIOLATION) => Ok(None),
            Err(err) => Err(err).context("failed to insert comment"),
        }
    }

    async fn find_comment(&self, id: Uuid) -> Result<Option<Comment>> {
        let query = format!("SELECT {COMMENT_COLUMNS} FROM comments WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await
            .context("failed to lookup comment")?;
        row.as_ref().map(comment_from_row).transpose()
    }

    async fn update_comment(&self, id: Uuid, content: &str) -> Result<Option<Comment>> {
        let query = format!(
            "UPDATE comments SET content = $2, updated_at = NOW() WHERE id = $1 \
             RETURNING {COMMENT_COLUMNS}"
        );
        let row = sqlx::query(&query)
            .bind(id)
            .bind(content)
            .fetch_optional(&self.pool)
            .instrument(query_span("UPDATE", &query))
            .await
            .context("failed to update comment")?;
        row.as_ref().map(comment_from_row).transpose()
    }

    async fn delete_comment(&self, id: Uuid) -> Result<bool> {
        let query = "DELETE FROM comments WHERE id = $1";
        let result = sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(query_span("DELETE", query))
            .await
            .context("failed to delete comment")?;
        Ok(result.rows_affected() == 1)
    }

    async fn insert_tweet(&self, owner: Uuid, content: &str) -> Result<Tweet> {
        let query = format!(
            "INSERT INTO tweets (id, content, owner_id) VALUES ($1, $2, $3) \
             RETURNING {TWEET_COLUMNS}"
        );
        let row = sqlx::query(&query)
            .bind(Uuid::now_v7())
            .bind(content)
            .bind(owner)
            .fetch_one(&self.pool)
            .instrument(query_span("INSERT", &query))
            .await
            .context("failed to insert tweet")?;
        tweet_from_row(&row)
    }

    async fn find_tweet(&self, id: Uuid) -> Result<Option<Tweet>> {
        let query = format!("SELECT {TWEET_COLUMNS} FROM tweets WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await
            .context("failed to lookup tweet")?;
        row.as_ref().map(tweet_from_row).transpose()
    }

    async fn list_tweets_by_owner(&self, owner: Uuid) -> Result<Vec<Tweet>> {
        let query = format!(
            "SELECT {TWEET_COLUMNS} FROM tweets WHERE owner_id = $1 \
             ORDER BY created_at DESC, id DESC"
        );
        let rows = sqlx::query(&query)
            .bind(owner)
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await
            .context("failed to list tweets by owner")?;
        rows.iter().map(tweet_from_row).collect()
    }

    async fn update_tweet(&self, id: Uuid, content: &str) -> Result<Option<Tweet>> {
        let query = format!(
            "UPDATE tweets SET content = $2, updated_at = NOW() WHERE id = $1 \
             RETURNING {TWEET_COLUMNS}"
        );
        let row = sqlx::query(&query)
            .bind(id)
            .bind(content)
            .fetch_optional(&self.pool)
            .instrument(query_span("UPDATE", &query))
            .await
            .context("failed to update tweet")?;
        row.as_ref().map(tweet_from_row).transpose()
    }

    async fn delete_tweet(&self, id: Uuid) -> Result<bool> {
        let query = "DELETE FROM tweets WHERE id = $1";
        let result = sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(query_span("DELETE", query))
            .await
            .context("failed to delete tweet")?;
        Ok(result.rows_affected() == 1)
    }

    async fn insert_video(&self, video: NewVideo) -> Result<Video> {
        let query = format!(
            r"
            INSERT INTO videos
                (id, owner_id, video_file, thumbnail, title, description, duration)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {VIDEO_COLUMNS}
            "
        );
        let row = sqlx::query(&query)
            .bind(Uuid::now_v7())
            .bind(video.owner)
            .bind(&video.video_file)
            .bind(&video.thumbnail)
            .bind(&video.title)
            .bind(&video.description)
            .bind(video.duration)
            .fetch_one(&self.pool)
            .instrument(query_span("INSERT", &query))
            .await
            .context("failed to insert video")?;
        video_from_row(&row)
    }

    async fn find_video(&self, id: Uuid) -> Result<Option<Video>> {
        let query = format!("SELECT {VIDEO_COLUMNS} FROM videos WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await
            .context("failed to lookup video")?;
        row.as_ref().map(video_from_row).transpose()
    }

    async fn update_video(&self, id: Uuid, patch: &VideoPatch) -> Result<Option<Video>> {
        let query = format!(
            r"
            UPDATE videos
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {VIDEO_COLUMNS}
            "
        );
        let row = sqlx::query(&query)
            .bind(id)
            .bind(&patch.title)
            .bind(&patch.description)
            .fetch_optional(&self.pool)
            .instrument(query_span("UPDATE", &query))
            .await
            .context("failed to update video")?;
        row.as_ref().map(video_from_row).transpose()
    }

    async fn delete_video(&self, id: Uuid) -> Result<bool> {
        // comments.video_id cascades.
        let query = "DELETE FROM videos WHERE id = $1";
        let result = sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(query_span("DELETE", query))
            .await
            .context("failed to delete video")?;
        Ok(result.rows_affected() == 1)
    }

    async fn toggle_video_published(&self, id: Uuid) -> Result<Option<Video>> {
        let query = format!(
            "UPDATE videos SET is_published = NOT is_published, updated_at = NOW() \
             WHERE id = $1 RETURNING {VIDEO_COLUMNS}"
        );
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(query_span("UPDATE", &query))
            .await
            .context("failed to toggle video publish status")?;
        row.as_ref().map(video_from_row).transpose()
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<()> {
        let mut connection = self
            .pool
            .acquire()
            .await
            .context("failed to acquire connection")?;
        connection.ping().await.context("database ping failed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_sql_statements_skips_comments_and_splits_on_semicolon() {
        let sql = "-- header\nCREATE TABLE a (id INT);\nCREATE INDEX i\n    ON a (id);\n";
        let statements = split_sql_statements(sql);
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0], "CREATE TABLE a (id INT);");
        assert!(statements[1].starts_with("CREATE INDEX i"));
    }

    #[test]
    fn schema_defines_every_table() {
        let statements = split_sql_statements(SCHEMA_SQL);
        for table in ["accounts", "videos", "comments", "tweets"] {
            assert!(
                statements
                    .iter()
                    .any(|s| s.contains(&format!("CREATE TABLE IF NOT EXISTS {table}"))),
                "missing table {table}"
            );
        }
        assert!(
            statements.iter().all(|s| s.contains("IF NOT EXISTS")),
            "schema statements must be idempotent"
        );
    }

    #[test]
    fn sqlstate_check_ignores_non_database_errors() {
        assert!(!has_sqlstate(&sqlx::Error::RowNotFound, UNIQUE_VIOLATION));
        assert!(!has_sqlstate(&sqlx::Error::PoolTimedOut, FOREIGN_KEY_VIOLATION));
    }
}
