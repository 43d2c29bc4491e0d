//! SQLite implementation of the local state store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use tracing::info;

use mailsync_core::{LocalRecord, LocalStore, StoreKind, SyncError, SyncResult};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS entities (
    address      TEXT PRIMARY KEY,
    active       INTEGER NOT NULL,
    last_seen_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_entities_active ON entities (active, last_seen_at);
";

/// Local state database backed by a single SQLite file.
///
/// One row per address ever observed. The `last_seen_at` column carries
/// RFC 3339 timestamps so that ordering comparisons work as plain text.
#[derive(Clone)]
pub struct SqliteStateDb {
    pool: SqlitePool,
}

impl SqliteStateDb {
    /// Open (creating if necessary) the state database at the given path.
    pub async fn open(path: impl AsRef<Path>) -> SyncResult<Self> {
        let path = path.as_ref();

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| {
                SyncError::store_with_source(
                    StoreKind::Local,
                    "open",
                    format!("failed to open state database at {}", path.display()),
                    e,
                )
            })?;

        let db = Self { pool };
        db.migrate().await?;

        info!(path = %path.display(), "Opened state database");

        Ok(db)
    }

    /// Open an in-memory database. Test and dry-run use only; state does not
    /// survive the process.
    pub async fn in_memory() -> SyncResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| {
                SyncError::store_with_source(StoreKind::Local, "open", "invalid sqlite URL", e)
            })?;

        // A single connection keeps every caller on the same in-memory
        // database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| {
                SyncError::store_with_source(
                    StoreKind::Local,
                    "open",
                    "failed to open in-memory state database",
                    e,
                )
            })?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> SyncResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                SyncError::store_with_source(StoreKind::Local, "migrate", "schema setup failed", e)
            })?;
        Ok(())
    }

    /// Number of rows in the store, active or not.
    pub async fn record_count(&self) -> SyncResult<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM entities")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                SyncError::store_with_source(StoreKind::Local, "count", "count query failed", e)
            })?;
        let n: i64 = row.get("n");
        Ok(n as u64)
    }
}

#[async_trait]
impl LocalStore for SqliteStateDb {
    async fn lookup(&self, address: &str) -> SyncResult<Option<LocalRecord>> {
        let row = sqlx::query("SELECT active, last_seen_at FROM entities WHERE address = ?")
            .bind(address)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                SyncError::store_with_source(
                    StoreKind::Local,
                    "lookup",
                    format!("lookup failed for {address}"),
                    e,
                )
            })?;

        let Some(row) = row else {
            return Ok(None);
        };

        let active: i64 = row.get("active");
        let last_seen_at: String = row.get("last_seen_at");
        let last_seen_at = DateTime::parse_from_rfc3339(&last_seen_at)
            .map_err(|e| {
                SyncError::store_with_source(
                    StoreKind::Local,
                    "lookup",
                    format!("corrupt last_seen_at for {address}"),
                    e,
                )
            })?
            .with_timezone(&Utc);

        Ok(Some(LocalRecord {
            active: active != 0,
            last_seen_at,
        }))
    }

    async fn create(&self, address: &str, active: bool, seen_at: DateTime<Utc>) -> SyncResult<()> {
        sqlx::query("INSERT INTO entities (address, active, last_seen_at) VALUES (?, ?, ?)")
            .bind(address)
            .bind(i64::from(active))
            .bind(seen_at.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                SyncError::store_with_source(
                    StoreKind::Local,
                    "create",
                    format!("insert failed for {address}"),
                    e,
                )
            })?;
        Ok(())
    }

    async fn set_active(&self, address: &str, active: bool) -> SyncResult<()> {
        let result = sqlx::query("UPDATE entities SET active = ? WHERE address = ?")
            .bind(i64::from(active))
            .bind(address)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                SyncError::store_with_source(
                    StoreKind::Local,
                    "set_active",
                    format!("update failed for {address}"),
                    e,
                )
            })?;

        if result.rows_affected() == 0 {
            return Err(SyncError::store(
                StoreKind::Local,
                "set_active",
                format!("no record for {address}"),
            ));
        }
        Ok(())
    }

    async fn mark_seen(&self, address: &str, seen_at: DateTime<Utc>) -> SyncResult<()> {
        let result = sqlx::query("UPDATE entities SET last_seen_at = ? WHERE address = ?")
            .bind(seen_at.to_rfc3339())
            .bind(address)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                SyncError::store_with_source(
                    StoreKind::Local,
                    "mark_seen",
                    format!("update failed for {address}"),
                    e,
                )
            })?;

        if result.rows_affected() == 0 {
            return Err(SyncError::store(
                StoreKind::Local,
                "mark_seen",
                format!("no record for {address}"),
            ));
        }
        Ok(())
    }

    async fn active_not_seen_since(
        &self,
        cycle_started_at: DateTime<Utc>,
    ) -> SyncResult<Vec<String>> {
        let rows = sqlx::query(
            "SELECT address FROM entities
             WHERE active = 1 AND last_seen_at < ?
             ORDER BY address",
        )
        .bind(cycle_started_at.to_rfc3339())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            SyncError::store_with_source(
                StoreKind::Local,
                "active_not_seen_since",
                "sweep query failed",
                e,
            )
        })?;

        Ok(rows.into_iter().map(|row| row.get("address")).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn create_and_lookup_roundtrip() {
        let db = SqliteStateDb::in_memory().await.unwrap();
        let now = Utc::now();

        assert!(db.lookup("a@x.com").await.unwrap().is_none());

        db.create("a@x.com", true, now).await.unwrap();
        let record = db.lookup("a@x.com").await.unwrap().unwrap();
        assert!(record.active);
        assert_eq!(record.last_seen_at.timestamp(), now.timestamp());
    }

    #[tokio::test]
    async fn duplicate_create_is_rejected() {
        let db = SqliteStateDb::in_memory().await.unwrap();
        let now = Utc::now();

        db.create("a@x.com", true, now).await.unwrap();
        assert!(db.create("a@x.com", true, now).await.is_err());
    }

    #[tokio::test]
    async fn set_active_flips_flag() {
        let db = SqliteStateDb::in_memory().await.unwrap();
        let now = Utc::now();

        db.create("a@x.com", true, now).await.unwrap();
        db.set_active("a@x.com", false).await.unwrap();
        assert!(!db.lookup("a@x.com").await.unwrap().unwrap().active);

        db.set_active("a@x.com", true).await.unwrap();
        assert!(db.lookup("a@x.com").await.unwrap().unwrap().active);
    }

    #[tokio::test]
    async fn set_active_requires_existing_record() {
        let db = SqliteStateDb::in_memory().await.unwrap();
        assert!(db.set_active("ghost@x.com", false).await.is_err());
        assert!(db.mark_seen("ghost@x.com", Utc::now()).await.is_err());
    }

    #[tokio::test]
    async fn sweep_query_finds_stale_active_records() {
        let db = SqliteStateDb::in_memory().await.unwrap();
        let cycle_start = Utc::now();
        let before = cycle_start - Duration::hours(1);

        // Stale and active: sweep candidate.
        db.create("stale@x.com", true, before).await.unwrap();
        // Stale but already inactive: not a candidate.
        db.create("gone@x.com", false, before).await.unwrap();
        // Seen this cycle: not a candidate.
        db.create("fresh@x.com", true, cycle_start + Duration::seconds(1))
            .await
            .unwrap();

        let stale = db.active_not_seen_since(cycle_start).await.unwrap();
        assert_eq!(stale, vec!["stale@x.com".to_string()]);
    }

    #[tokio::test]
    async fn mark_seen_removes_from_sweep_candidates() {
        let db = SqliteStateDb::in_memory().await.unwrap();
        let cycle_start = Utc::now();
        let before = cycle_start - Duration::hours(1);

        db.create("a@x.com", true, before).await.unwrap();
        assert_eq!(db.active_not_seen_since(cycle_start).await.unwrap().len(), 1);

        db.mark_seen("a@x.com", cycle_start + Duration::seconds(1))
            .await
            .unwrap();
        assert!(db.active_not_seen_since(cycle_start).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.db");
        let now = Utc::now();

        {
            let db = SqliteStateDb::open(&path).await.unwrap();
            db.create("a@x.com", true, now).await.unwrap();
            db.set_active("a@x.com", false).await.unwrap();
        }

        let db = SqliteStateDb::open(&path).await.unwrap();
        let record = db.lookup("a@x.com").await.unwrap().unwrap();
        assert!(!record.active);
        assert_eq!(db.record_count().await.unwrap(), 1);
    }
}
