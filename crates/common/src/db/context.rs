//! Request-scoped unit of work
//!
//! A [`DbContext`] is handed out per request by [`DbPool::begin_scope`].
//! Repositories obtained from it stage their writes here, and
//! [`DbContext::save_changes`] applies the whole batch inside a single
//! transaction. Nothing staged is visible to readers until that commit.
//!
//! [`DbPool::begin_scope`]: crate::db::DbPool::begin_scope

use crate::db::models::*;
use crate::db::repository::BaseRepository;
use crate::errors::{AppError, Result};
use crate::metrics;
use async_trait::async_trait;
use sea_orm::{DatabaseConnection, DatabaseTransaction, DbErr, TransactionTrait};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

/// A write waiting for the next commit
#[async_trait]
pub(crate) trait StagedWrite: Send {
    /// Table the write targets, used for logging and error reporting
    fn entity(&self) -> &str;

    /// Apply the write inside the commit transaction, returning affected rows
    async fn apply(self: Box<Self>, txn: &DatabaseTransaction) -> std::result::Result<u64, DbErr>;
}

#[derive(Default)]
struct Staged {
    writes: Vec<Box<dyn StagedWrite>>,
    /// `table:key` of every row with a pending delete
    removed: HashSet<String>,
}

struct ContextInner {
    conn: DatabaseConnection,
    staged: Mutex<Staged>,
}

/// Unit of work shared by every repository of one request scope
#[derive(Clone)]
pub struct DbContext {
    inner: Arc<ContextInner>,
}

impl DbContext {
    pub(crate) fn new(conn: DatabaseConnection) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                conn,
                staged: Mutex::new(Staged::default()),
            }),
        }
    }

    /// Connection used for reads
    pub(crate) fn conn(&self) -> &DatabaseConnection {
        &self.inner.conn
    }

    pub(crate) async fn stage(&self, write: Box<dyn StagedWrite>) {
        debug!(entity = write.entity(), "Write staged");
        self.inner.staged.lock().await.writes.push(write);
    }

    /// Stage a delete unless the same row already has one pending.
    /// Returns false when the row was already marked.
    pub(crate) async fn stage_removal(&self, target: String, write: Box<dyn StagedWrite>) -> bool {
        let mut staged = self.inner.staged.lock().await;
        if !staged.removed.insert(target) {
            return false;
        }
        debug!(entity = write.entity(), "Delete staged");
        staged.writes.push(write);
        true
    }

    /// Number of writes waiting for [`save_changes`](Self::save_changes)
    pub async fn pending(&self) -> usize {
        self.inner.staged.lock().await.writes.len()
    }

    /// Drop every staged write without touching the store
    pub async fn discard(&self) {
        let dropped = std::mem::take(&mut *self.inner.staged.lock().await).writes.len();
        if dropped > 0 {
            debug!(dropped, "Staged writes discarded");
        }
    }

    /// Commit all staged writes atomically, returning the number of affected rows.
    ///
    /// Either every staged write becomes visible or none does. If this future
    /// is dropped before it completes the open transaction is rolled back.
    pub async fn save_changes(&self) -> Result<u64> {
        let staged = std::mem::take(&mut *self.inner.staged.lock().await).writes;
        if staged.is_empty() {
            return Ok(0);
        }

        let batch = staged.len();
        let txn = self.inner.conn.begin().await?;
        let mut affected = 0;

        for write in staged {
            let entity = write.entity().to_string();
            match write.apply(&txn).await {
                Ok(rows) => affected += rows,
                Err(err) => {
                    warn!(entity = %entity, error = %err, batch, "Staged write failed, rolling back");
                    if let Err(rollback) = txn.rollback().await {
                        error!(entity = %entity, error = %rollback, "Rollback failed");
                    }
                    metrics::record_commit(false);
                    return Err(commit_error(entity, err));
                }
            }
        }

        if let Err(err) = txn.commit().await {
            metrics::record_commit(false);
            return Err(err.into());
        }
        metrics::record_commit(true);
        debug!(batch, affected, "Unit of work committed");
        Ok(affected)
    }

    pub fn books(&self) -> BaseRepository<BookEntity> {
        BaseRepository::new(self.clone())
    }

    pub fn genres(&self) -> BaseRepository<GenreEntity> {
        BaseRepository::new(self.clone())
    }

    pub fn tags(&self) -> BaseRepository<TagEntity> {
        BaseRepository::new(self.clone())
    }

    pub fn book_genres(&self) -> BaseRepository<BookGenreEntity> {
        BaseRepository::new(self.clone())
    }

    pub fn book_tags(&self) -> BaseRepository<BookTagEntity> {
        BaseRepository::new(self.clone())
    }

    pub fn users(&self) -> BaseRepository<UserEntity> {
        BaseRepository::new(self.clone())
    }

    pub fn comments(&self) -> BaseRepository<CommentEntity> {
        BaseRepository::new(self.clone())
    }
}

/// An update whose target row is gone is reported as a missing entity;
/// everything else is a persistence failure.
fn commit_error(entity: String, err: DbErr) -> AppError {
    match err {
        DbErr::RecordNotUpdated => AppError::NotFound {
            resource_type: entity,
            id: "<staged update>".to_string(),
        },
        DbErr::RecordNotFound(id) => AppError::NotFound {
            resource_type: entity,
            id,
        },
        other => AppError::Persistence(other),
    }
}
