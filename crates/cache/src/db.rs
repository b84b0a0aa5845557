//! Database connection and pool management.

use exn::ResultExt;
use sqlx::SqliteConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::time::Duration;
use tracing::instrument;

use crate::error::{ErrorKind, Result};

/// Embedded migrations that are run automatically on connect.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
// Everything runs sequentially on one thread, but an open batch holds its
// connection until commit and lookups may still happen alongside it.
const MAX_CONNECTIONS: u32 = 2;

/// Connection pool for the post record. Build a
/// [`Repository`](crate::Repository) from it to read and write posts.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open the post record at `path`, creating the file and its parent
    /// directory when missing. Pending migrations are applied before the
    /// handle is returned.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).or_raise(|| ErrorKind::Database)?;
        }
        tracing::debug!(path = %path.display(), "Opening post record");
        let options = connect_options().filename(path).create_if_missing(true);
        Self::open(options, MAX_CONNECTIONS).await
    }

    /// Open an empty post record that lives only as long as the returned
    /// handle. Available outside of tests so dependent crates can use it in
    /// theirs.
    pub async fn connect_in_memory() -> Result<Self> {
        // Every pooled connection to ":memory:" would get its own database.
        let options = connect_options().filename(":memory:");
        Self::open(options, 1).await
    }

    async fn open(options: SqliteConnectOptions, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            // Per-connection PRAGMAs must run on every pooled connection, not
            // only on the first one handed out.
            .after_connect(|conn, _meta| Box::pin(async move { tune_connection(conn).await }))
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let db = Self { pool };
        db.ensure_schema().await?;
        Ok(db)
    }

    /// Apply pending migrations.
    ///
    /// Called by both constructors and safe to call again. A `content` table
    /// created before migrations existed is kept along with its rows.
    #[instrument("ensuring database schema", skip(self))]
    pub async fn ensure_schema(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await.or_raise(|| ErrorKind::Migration)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Refresh planner statistics and close every pooled connection.
    pub async fn close(&self) {
        _ = sqlx::query("PRAGMA optimize").execute(&self.pool).await;
        self.pool.close().await;
    }
}

fn connect_options() -> SqliteConnectOptions {
    SqliteConnectOptions::new()
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        // Two runs syncing different tags into one record contend for the
        // write lock for the length of a commit.
        .busy_timeout(Duration::from_millis(1500))
}

async fn tune_connection(conn: &mut SqliteConnection) -> sqlx::Result<()> {
    sqlx::query("PRAGMA temp_store = MEMORY; PRAGMA cache_size = -4096; PRAGMA analysis_limit = 400;")
        .execute(conn)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_schema_is_idempotent() {
        let db = Database::connect_in_memory().await.unwrap();
        db.ensure_schema().await.unwrap();
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM content").fetch_one(db.pool()).await.unwrap();
        assert_eq!(row.0, 0);
        db.close().await;
        assert!(db.pool().is_closed());
    }

    #[tokio::test]
    async fn test_connect_creates_parent_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("booru.sqlite3");
        let db = Database::connect(&path).await.unwrap();
        assert!(path.is_file());
        let row: (String,) = sqlx::query_as("PRAGMA journal_mode").fetch_one(db.pool()).await.unwrap();
        assert_eq!(row.0, "wal");
        let row: (i64,) = sqlx::query_as("PRAGMA temp_store").fetch_one(db.pool()).await.unwrap();
        assert_eq!(row.0, 2, "temp_store should be MEMORY");
        db.close().await;
    }

    #[tokio::test]
    async fn test_adopts_legacy_table() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("legacy.sqlite3");
        // Created by hand, without any migration history.
        let options = SqliteConnectOptions::new().filename(&path).create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await.unwrap();
        sqlx::query("CREATE TABLE content (id INTEGER PRIMARY KEY, md5 TEXT, tags TEXT, misc BLOB)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO content (id, md5, tags, misc) VALUES (7, 'abc', 'negima', x'')")
            .execute(&pool)
            .await
            .unwrap();
        pool.close().await;

        let db = Database::connect(&path).await.unwrap();
        let row: (i64, String) = sqlx::query_as("SELECT id, md5 FROM content").fetch_one(db.pool()).await.unwrap();
        assert_eq!(row, (7, "abc".to_string()));
        db.close().await;
    }
}
