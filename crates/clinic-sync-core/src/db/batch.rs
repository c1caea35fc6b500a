//! Write batches with the document store's per-commit cap.

use serde_json::Value;
use tracing::debug;

use super::{Database, DbResult};

/// Maximum number of writes a single batch commit may carry.
pub const MAX_BATCH_WRITES: usize = 400;

/// A single write operation.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Set {
        collection: String,
        id: String,
        data: Value,
    },
    Delete {
        collection: String,
        id: String,
    },
}

/// An ordered group of writes committed atomically.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, collection: &str, id: &str, data: Value) {
        self.ops.push(WriteOp::Set {
            collection: collection.to_string(),
            id: id.to_string(),
            data,
        });
    }

    pub fn delete(&mut self, collection: &str, id: &str) {
        self.ops.push(WriteOp::Delete {
            collection: collection.to_string(),
            id: id.to_string(),
        });
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Totals reported by a finished [`BatchWriter`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    /// Number of batch commits issued
    pub commits: usize,
    /// Number of individual writes committed
    pub writes: usize,
}

/// Accumulates writes and commits them in capped batches.
///
/// A batch is flushed as soon as it reaches the limit; [`BatchWriter::finish`]
/// flushes the remainder. Commits already made are not rolled back if a later
/// one fails.
pub struct BatchWriter<'a> {
    db: &'a Database,
    batch: WriteBatch,
    limit: usize,
    stats: BatchStats,
}

impl<'a> BatchWriter<'a> {
    /// Create a writer using the store's maximum batch size.
    pub fn new(db: &'a Database) -> Self {
        Self::with_limit(db, MAX_BATCH_WRITES)
    }

    /// Create a writer with a smaller batch size. Values are clamped to `1..=400`.
    pub fn with_limit(db: &'a Database, limit: usize) -> Self {
        Self {
            db,
            batch: WriteBatch::new(),
            limit: limit.clamp(1, MAX_BATCH_WRITES),
            stats: BatchStats::default(),
        }
    }

    pub fn set(&mut self, collection: &str, id: &str, data: Value) -> DbResult<()> {
        self.batch.set(collection, id, data);
        self.flush_if_full()
    }

    pub fn delete(&mut self, collection: &str, id: &str) -> DbResult<()> {
        self.batch.delete(collection, id);
        self.flush_if_full()
    }

    /// Writes queued but not yet committed.
    pub fn pending(&self) -> usize {
        self.batch.len()
    }

    /// Commit whatever is pending and return the totals.
    pub fn finish(mut self) -> DbResult<BatchStats> {
        self.flush()?;
        Ok(self.stats)
    }

    fn flush_if_full(&mut self) -> DbResult<()> {
        if self.batch.len() >= self.limit {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> DbResult<()> {
        if self.batch.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(&mut self.batch);
        self.db.commit_batch(&batch)?;
        self.stats.commits += 1;
        self.stats.writes += batch.len();
        debug!(
            writes = batch.len(),
            commits = self.stats.commits,
            "batch committed"
        );
        Ok(())
    }
}
