//! SQLite-backed blob store.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use super::{BlobStore, StoreError, StoreKey};
use crate::model::{AccountId, FolderId};

/// Blob store persisting folder snapshots in one SQLite table.
pub struct SqliteBlobStore {
    pool: SqlitePool,
}

impl SqliteBlobStore {
    /// Opens (creating if needed) the database at `database_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or schema creation fails.
    pub async fn new(database_path: &str) -> Result<Self, StoreError> {
        let url = format!("sqlite:{database_path}?mode=rwc");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let store = Self { pool };
        store.initialize().await?;
        Ok(store)
    }

    /// Creates an in-memory database for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or schema creation fails.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let store = Self { pool };
        store.initialize().await?;
        Ok(store)
    }

    async fn initialize(&self) -> Result<(), StoreError> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS folder_snapshots (
                account_id INTEGER NOT NULL,
                folder_path TEXT NOT NULL,
                snapshot BLOB NOT NULL,
                saved_at TEXT NOT NULL,
                PRIMARY KEY(account_id, folder_path)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Close the connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl BlobStore for SqliteBlobStore {
    async fn commit(&self, entries: Vec<(StoreKey, Vec<u8>)>) -> Result<(), StoreError> {
        let saved_at = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        for (key, bytes) in entries {
            sqlx::query(
                r"
                INSERT INTO folder_snapshots (account_id, folder_path, snapshot, saved_at)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(account_id, folder_path) DO UPDATE SET
                    snapshot = excluded.snapshot,
                    saved_at = excluded.saved_at
                ",
            )
            .bind(key.account.0)
            .bind(key.folder.as_str())
            .bind(bytes)
            .bind(&saved_at)
            .execute(&mut *tx)
            .await?;
        }

        // Dropping the transaction on an early return rolls it back.
        tx.commit().await?;
        Ok(())
    }

    async fn load(&self, account: AccountId) -> Result<Vec<(StoreKey, Vec<u8>)>, StoreError> {
        let rows = sqlx::query(
            r"
            SELECT folder_path, snapshot
            FROM folder_snapshots
            WHERE account_id = ?
            ORDER BY folder_path
            ",
        )
        .bind(account.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<_, StoreError> {
                let folder: String = row.try_get("folder_path")?;
                let bytes: Vec<u8> = row.try_get("snapshot")?;
                Ok((StoreKey::new(account, FolderId::new(folder)), bytes))
            })
            .collect()
    }
}
