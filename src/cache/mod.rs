// syncrotron/src/cache/mod.rs
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use std::fmt;
use std::path::Path;

use crate::errors::Result;

/// Date ordering applied when selecting pending EPNs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TransferOrder {
    Asc,
    Desc,
}

impl fmt::Display for TransferOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferOrder::Asc => write!(f, "asc"),
            TransferOrder::Desc => write!(f, "desc"),
        }
    }
}

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS epns (
    epn TEXT PRIMARY KEY,
    collected_at TEXT NOT NULL,
    transferred_at TEXT
)";

/// Local store tracking which EPNs have already been transferred, so a
/// sync run never downloads the same experiment twice.
pub struct CacheDb {
    pool: SqlitePool,
}

impl CacheDb {
    /// Opens the cache database at the given path, creating the file and
    /// schema when missing.
    pub async fn open(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;
        sqlx::query(SCHEMA).execute(&pool).await?;
        Ok(CacheDb { pool })
    }

    /// Returns up to `limit` EPNs that have not been transferred yet,
    /// ordered by collection date.
    pub async fn pending_epns(&self, order: TransferOrder, limit: u32) -> Result<Vec<String>> {
        let sql = match order {
            TransferOrder::Asc => {
                "SELECT epn FROM epns WHERE transferred_at IS NULL \
                 ORDER BY collected_at ASC LIMIT ?"
            }
            TransferOrder::Desc => {
                "SELECT epn FROM epns WHERE transferred_at IS NULL \
                 ORDER BY collected_at DESC LIMIT ?"
            }
        };
        let rows: Vec<(String,)> = sqlx::query_as(sql)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(epn,)| epn).collect())
    }

    /// Records an EPN seen on the remote. Idempotent; re-recording a known
    /// EPN keeps its original collection date and transfer state.
    pub async fn record_epn(&self, epn: &str, collected_at: DateTime<Utc>) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO epns (epn, collected_at) VALUES (?, ?)")
            .bind(epn)
            .bind(collected_at.to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Stamps an EPN as transferred so later runs skip it.
    pub async fn mark_transferred(&self, epn: &str) -> Result<()> {
        sqlx::query("UPDATE epns SET transferred_at = ? WHERE epn = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(epn)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    async fn memory_db() -> CacheDb {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::query(SCHEMA).execute(&pool).await.unwrap();
        CacheDb { pool }
    }

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2019, 3, d, 0, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_pending_respects_order_and_limit() {
        let db = memory_db().await;
        db.record_epn("12345a", day(3)).await.unwrap();
        db.record_epn("12346b", day(1)).await.unwrap();
        db.record_epn("12347c", day(2)).await.unwrap();

        let asc = db.pending_epns(TransferOrder::Asc, 50).await.unwrap();
        assert_eq!(asc, vec!["12346b", "12347c", "12345a"]);

        let desc = db.pending_epns(TransferOrder::Desc, 2).await.unwrap();
        assert_eq!(desc, vec!["12345a", "12347c"]);
    }

    #[tokio::test]
    async fn test_transferred_epns_are_excluded() {
        let db = memory_db().await;
        db.record_epn("12345a", day(1)).await.unwrap();
        db.record_epn("12346b", day(2)).await.unwrap();
        db.mark_transferred("12345a").await.unwrap();

        let pending = db.pending_epns(TransferOrder::Asc, 50).await.unwrap();
        assert_eq!(pending, vec!["12346b"]);
    }

    #[tokio::test]
    async fn test_record_epn_is_idempotent() {
        let db = memory_db().await;
        db.record_epn("12345a", day(1)).await.unwrap();
        db.mark_transferred("12345a").await.unwrap();
        db.record_epn("12345a", day(5)).await.unwrap();

        // Still transferred, not resurrected by the second record.
        let pending = db.pending_epns(TransferOrder::Asc, 50).await.unwrap();
        assert!(pending.is_empty());
    }

    #[tokio::test]
    async fn test_open_creates_file_and_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("files.db");
        let db = CacheDb::open(&path).await.unwrap();
        db.record_epn("12345a", day(1)).await.unwrap();
        assert!(path.exists());
    }
}
