//! Repository for the `content` table.
//!
//! Reads go straight to the pool. Writes always go through a [`Batch`], which
//! wraps a single transaction: nothing a batch inserts is visible or durable
//! until [`Batch::commit`] is called.

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::PostRow;
use booru_api::models::Post;
use exn::ResultExt;
use sqlx::{QueryBuilder, Sqlite, SqlitePool, Transaction};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// SQLite's historical default for host parameters per statement is 999;
/// stay well under it.
const MAX_BIND_PARAMS: usize = 500;

/// Outcome of [`Batch::insert_if_absent`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Inserted {
    /// Rows written by this call.
    pub inserted: u64,
    /// Posts whose identifier was already stored.
    pub ignored: u64,
    /// Posts that could not be encoded and were skipped.
    pub failed: u64,
}

/// Repository for reading and recording posts.
///
/// Clones share the same pool and the same session change counter.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
    dry_run: bool,
    changes: Arc<AtomicU64>,
}
impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self::new(db.pool().clone(), false)
    }
}
impl Repository {
    /// Create a new repository with the given connection pool.
    ///
    /// In dry-run mode every read behaves normally, but batches are rolled
    /// back instead of committed.
    pub fn new(pool: SqlitePool, dry_run: bool) -> Self {
        Self { pool, dry_run, changes: Arc::new(AtomicU64::new(0)) }
    }

    /// Rows committed through this repository (and its clones) since it was
    /// created.
    pub fn session_changes(&self) -> u64 {
        self.changes.load(Ordering::Relaxed)
    }

    /// Return the candidate identifiers that are not stored yet.
    ///
    /// Duplicate candidates collapse. Identifiers too large for SQLite's
    /// integer type can never have been stored, so they are always unseen.
    pub async fn filter_unseen(&self, ids: impl IntoIterator<Item = u64>) -> Result<BTreeSet<u64>> {
        let mut unseen: BTreeSet<u64> = ids.into_iter().collect();
        let storable: Vec<i64> = unseen.iter().filter_map(|id| i64::try_from(*id).ok()).collect();
        for chunk in storable.chunks(MAX_BIND_PARAMS) {
            let mut query = QueryBuilder::<Sqlite>::new("SELECT id FROM content WHERE id IN (");
            let mut separated = query.separated(", ");
            for id in chunk {
                separated.push_bind(*id);
            }
            separated.push_unseparated(")");
            let seen: Vec<(i64,)> =
                query.build_query_as().fetch_all(&self.pool).await.or_raise(|| ErrorKind::Database)?;
            for (id,) in seen {
                // Stored identifiers came from a u64 in the first place.
                if let Ok(id) = u64::try_from(id) {
                    unseen.remove(&id);
                }
            }
        }
        tracing::trace!(unseen = unseen.len(), "Filtered candidate posts");
        Ok(unseen)
    }

    /// Map content hashes to the identifier of the stored post that carries
    /// them.
    ///
    /// Hashes that are not stored are absent from the result. Should two
    /// stored posts share a hash, the lowest identifier wins.
    pub async fn lookup_ids_by_hash(&self, hashes: &[String]) -> Result<HashMap<String, u64>> {
        let mut found = HashMap::new();
        for chunk in hashes.chunks(MAX_BIND_PARAMS) {
            let mut query = QueryBuilder::<Sqlite>::new("SELECT md5, id FROM content WHERE md5 IN (");
            let mut separated = query.separated(", ");
            for hash in chunk {
                separated.push_bind(hash.as_str());
            }
            separated.push_unseparated(") ORDER BY id");
            let rows: Vec<(String, i64)> =
                query.build_query_as().fetch_all(&self.pool).await.or_raise(|| ErrorKind::Database)?;
            for (hash, id) in rows {
                if let Ok(id) = u64::try_from(id) {
                    found.entry(hash).or_insert(id);
                }
            }
        }
        Ok(found)
    }

    /// Open a write batch.
    ///
    /// The batch holds a pooled connection until it is committed or dropped.
    /// With an in-memory database (a single connection) no other query can
    /// run in the meantime.
    pub async fn begin(&self) -> Result<Batch> {
        let tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        Ok(Batch { tx, dry_run: self.dry_run, inserted: 0, changes: Arc::clone(&self.changes) })
    }
}

/// A set of inserts that become durable together.
///
/// Dropping a batch without calling [`commit`](Self::commit) rolls it back.
pub struct Batch {
    tx: Transaction<'static, Sqlite>,
    dry_run: bool,
    inserted: u64,
    changes: Arc<AtomicU64>,
}
impl Batch {
    /// Insert every post whose identifier is not stored yet.
    ///
    /// A post that cannot be encoded is logged and skipped; the rest of the
    /// batch carries on. Database errors abort the call.
    pub async fn insert_if_absent<'a>(&mut self, posts: impl IntoIterator<Item = &'a Post>) -> Result<Inserted> {
        let mut outcome = Inserted::default();
        for post in posts {
            let row = match PostRow::try_from(post) {
                Ok(row) => row,
                Err(err) => {
                    tracing::warn!(id = post.id, error = ?err, "Skipping post that cannot be stored");
                    outcome.failed += 1;
                    continue;
                },
            };
            let result = sqlx::query(include_str!("../queries/insert_post.sql"))
                .bind(row.id)
                .bind(row.md5)
                .bind(row.tags)
                .bind(row.misc)
                .execute(&mut *self.tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
            if result.rows_affected() > 0 {
                outcome.inserted += 1;
            } else {
                outcome.ignored += 1;
            }
        }
        self.inserted += outcome.inserted;
        Ok(outcome)
    }

    /// Make the batch durable and return the number of rows it inserted.
    ///
    /// In dry-run mode the batch is rolled back and `0` is returned.
    pub async fn commit(self) -> Result<u64> {
        if self.dry_run {
            self.tx.rollback().await.or_raise(|| ErrorKind::Database)?;
            tracing::debug!(discarded = self.inserted, "Rolled back dry-run batch");
            return Ok(0);
        }
        self.tx.commit().await.or_raise(|| ErrorKind::Database)?;
        self.changes.fetch_add(self.inserted, Ordering::Relaxed);
        Ok(self.inserted)
    }
}
