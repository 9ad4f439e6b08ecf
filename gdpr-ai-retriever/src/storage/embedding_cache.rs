//! SQLite cache of chunk embeddings.
//!
//! Embedding the whole corpus is the slow (and, for hosted providers, billed)
//! part of start-up. The cache stores one vector per chunk text and model, so a
//! restart only embeds chunks whose text changed.
//!
//! ## Database Schema
//!
//! ```sql
//! CREATE TABLE embeddings (
//!     model_id TEXT NOT NULL,          -- EmbeddingProvider::model_id()
//!     content_hash BLOB NOT NULL,      -- blake3 hash of the chunk text (32 bytes)
//!     dimension INTEGER NOT NULL,
//!     embedding BLOB NOT NULL,         -- f16 vector, native byte order
//!     created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
//!     PRIMARY KEY (model_id, content_hash)
//! );
//! ```

use crate::error::Result;
use half::f16;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::path::Path;

/// Blake3 hash identifying a chunk text (32 bytes).
pub type ContentHash = [u8; 32];

pub fn content_hash(text: &str) -> ContentHash {
    *blake3::hash(text.as_bytes()).as_bytes()
}

/// Persistent map from `(model_id, content_hash)` to an f16 embedding.
#[derive(Clone, Debug)]
pub struct EmbeddingCache {
    pool: SqlitePool,
}

impl EmbeddingCache {
    /// Opens (creating if needed) the cache database at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let pool = SqlitePool::connect_with(
            SqliteConnectOptions::new()
                .filename(path)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
                .busy_timeout(std::time::Duration::from_secs(5))
                .create_if_missing(true),
        )
        .await?;
        Self::new_with_pool(pool).await
    }

    /// Opens an in-memory cache, mainly for tests.
    pub async fn open_memory() -> Result<Self> {
        // Each in-memory connection is its own database, so keep exactly one.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::new_with_pool(pool).await
    }

    async fn new_with_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS embeddings (
                model_id TEXT NOT NULL,
                content_hash BLOB NOT NULL,
                dimension INTEGER NOT NULL,
                embedding BLOB NOT NULL,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (model_id, content_hash)
            )
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    /// Looks up the embeddings stored for `hashes`; missing hashes are absent from the map.
    pub async fn get_many(
        &self,
        model_id: &str,
        hashes: &[ContentHash],
    ) -> Result<HashMap<ContentHash, Vec<f16>>> {
        let mut found = HashMap::new();
        let mut conn = self.pool.acquire().await?;

        for hash in hashes {
            if found.contains_key(hash) {
                continue;
            }
            let row = sqlx::query(
                "SELECT dimension, embedding FROM embeddings WHERE model_id = ?1 AND content_hash = ?2",
            )
            .bind(model_id)
            .bind(&hash[..])
            .fetch_optional(&mut *conn)
            .await?;

            if let Some(row) = row {
                let dimension: i64 = row.get("dimension");
                let bytes: Vec<u8> = row.get("embedding");
                if dimension <= 0 || bytes.len() != dimension as usize * size_of::<f16>() {
                    tracing::warn!(
                        "Ignoring corrupt cached embedding {} for {}",
                        hex::encode(hash),
                        model_id
                    );
                    continue;
                }
                // pod_collect_to_vec copies, so the blob needs no particular alignment.
                found.insert(*hash, bytemuck::pod_collect_to_vec::<u8, f16>(&bytes));
            }
        }

        Ok(found)
    }

    /// Stores embeddings, replacing any previous vector for the same key.
    pub async fn put_many(
        &self,
        model_id: &str,
        entries: &[(ContentHash, Vec<f16>)],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for (hash, embedding) in entries {
            sqlx::query(
                r#"
                INSERT INTO embeddings (model_id, content_hash, dimension, embedding)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(model_id, content_hash) DO UPDATE SET
                    dimension = excluded.dimension,
                    embedding = excluded.embedding,
                    created_at = CURRENT_TIMESTAMP
                "#,
            )
            .bind(model_id)
            .bind(&hash[..])
            .bind(embedding.len() as i64)
            .bind(bytemuck::cast_slice::<f16, u8>(embedding))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Number of cached vectors for `model_id`
    pub async fn count(&self, model_id: &str) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM embeddings WHERE model_id = ?1")
            .bind(model_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }
}
