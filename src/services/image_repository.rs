//! Image metadata persistence.
//!
//! Every read and delete is filtered by `(id, user_id)` or `user_id`, so a
//! caller can never observe or remove another user's rows. Ownership is
//! enforced by the query itself rather than a separate check.

use crate::models::image::{ImageRecord, NewImage};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;

pub type RepoResult<T> = Result<T, sqlx::Error>;

#[async_trait]
pub trait ImageRepository: Send + Sync {
    /// Insert a record and return it with its assigned id and timestamp.
    async fn insert(&self, image: NewImage) -> RepoResult<ImageRecord>;

    /// All records owned by `user_id`, newest first.
    async fn find_many(&self, user_id: &str) -> RepoResult<Vec<ImageRecord>>;

    /// The record with `id` if it belongs to `user_id`.
    async fn find_one(&self, id: i64, user_id: &str) -> RepoResult<Option<ImageRecord>>;

    /// Delete the record with `id` if it belongs to `user_id`. Returns the
    /// number of rows removed.
    async fn delete(&self, id: i64, user_id: &str) -> RepoResult<u64>;

    /// Connectivity probe.
    async fn ping(&self) -> RepoResult<()>;
}

#[derive(Clone)]
pub struct SqliteImageRepository {
    /// Shared SQLite connection pool.
    pub db: Arc<SqlitePool>,
}

impl SqliteImageRepository {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ImageRepository for SqliteImageRepository {
    async fn insert(&self, image: NewImage) -> RepoResult<ImageRecord> {
        sqlx::query_as::<_, ImageRecord>(
            r#"
            INSERT INTO images (user_id, url, path, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING id, user_id, url, path, created_at
            "#,
        )
        .bind(&image.user_id)
        .bind(&image.url)
        .bind(&image.path)
        .bind(Utc::now())
        .fetch_one(&*self.db)
        .await
    }

    async fn find_many(&self, user_id: &str) -> RepoResult<Vec<ImageRecord>> {
        sqlx::query_as::<_, ImageRecord>(
            "SELECT id, user_id, url, path, created_at
             FROM images
             WHERE user_id = ?
             ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&*self.db)
        .await
    }

    async fn find_one(&self, id: i64, user_id: &str) -> RepoResult<Option<ImageRecord>> {
        sqlx::query_as::<_, ImageRecord>(
            "SELECT id, user_id, url, path, created_at
             FROM images
             WHERE id = ? AND user_id = ?",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&*self.db)
        .await
    }

    async fn delete(&self, id: i64, user_id: &str) -> RepoResult<u64> {
        let result = sqlx::query("DELETE FROM images WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&*self.db)
            .await?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> RepoResult<()> {
        let one = sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await?;
        if one == 1 {
            Ok(())
        } else {
            Err(sqlx::Error::Protocol(format!("unexpected result: {one}")))
        }
    }
}
