//! Delivery log storage repository.

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};

use super::model::{DeliveryLogEntry, DeliveryMethod, DeliveryStatus};
use crate::Result;

/// Append-only `SQLite` store for delivery log entries.
#[derive(Debug, Clone)]
pub struct DeliveryLogRepository {
    pool: SqlitePool,
}

impl DeliveryLogRepository {
    /// Create a new repository with the given database path.
    ///
    /// Creates the database and tables if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn new(database_path: &str) -> Result<Self> {
        let url = format!("sqlite:{database_path}?mode=rwc");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;
        Self::from_pool(pool).await
    }

    /// Create an in-memory repository for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::from_pool(pool).await
    }

    /// Wraps an existing pool, creating the table if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if schema creation fails.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        let repo = Self { pool };
        repo.initialize().await?;
        Ok(repo)
    }

    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS delivery_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                recipient TEXT NOT NULL,
                subject TEXT NOT NULL,
                category TEXT,
                method TEXT NOT NULL,
                status TEXT NOT NULL,
                error TEXT,
                metadata TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_delivery_log_created ON delivery_log(created_at)
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Append an entry, returning its row id.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata cannot be serialized or the insert fails.
    pub async fn append(&self, entry: &DeliveryLogEntry) -> Result<i64> {
        let metadata = serde_json::to_string(&entry.metadata)?;
        let result = sqlx::query(
            r"
            INSERT INTO delivery_log
                (recipient, subject, category, method, status, error, metadata, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(&entry.recipient)
        .bind(&entry.subject)
        .bind(&entry.category)
        .bind(entry.method.as_str())
        .bind(entry.status.as_str())
        .bind(&entry.error)
        .bind(metadata)
        .bind(entry.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Most recent entries, newest first.
    ///
    /// Rows that can no longer be decoded are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn recent(&self, limit: u32) -> Result<Vec<DeliveryLogEntry>> {
        let rows = sqlx::query(
            r"
            SELECT recipient, subject, category, method, status, error, metadata, created_at
            FROM delivery_log
            ORDER BY id DESC
            LIMIT ?
            ",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().filter_map(row_to_entry).collect())
    }

    /// Number of stored entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM delivery_log")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }
}

fn row_to_entry(row: &SqliteRow) -> Option<DeliveryLogEntry> {
    let created_at: String = row.get("created_at");
    let metadata: String = row.get("metadata");

    Some(DeliveryLogEntry {
        recipient: row.get("recipient"),
        subject: row.get("subject"),
        category: row.get("category"),
        method: DeliveryMethod::parse(row.get("method"))?,
        status: DeliveryStatus::parse(row.get("status"))?,
        error: row.get("error"),
        metadata: serde_json::from_str(&metadata).ok()?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .ok()?
            .with_timezone(&Utc),
    })
}
