//! Strategy-aware driver shared by every reconciliation job.

use std::collections::HashSet;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::{RecordError, RecordOutcome, ReconcileJob, ReplaceStrategy, RunSummary, SyncResult};
use crate::db::{BatchWriter, Database, DbResult, MAX_BATCH_WRITES};

/// Runs [`ReconcileJob`]s against a database with batched writes.
pub struct SyncDriver<'a> {
    db: &'a Database,
    batch_size: usize,
    shadow_suffix: String,
}

impl<'a> SyncDriver<'a> {
    pub fn new(db: &'a Database, batch_size: usize, shadow_suffix: impl Into<String>) -> Self {
        Self {
            db,
            batch_size: batch_size.clamp(1, MAX_BATCH_WRITES),
            shadow_suffix: shadow_suffix.into(),
        }
    }

    pub fn run<J: ReconcileJob>(&self, job: &mut J) -> SyncResult<RunSummary> {
        let strategy = job.strategy();
        let target = job.target_collection().to_string();
        let mut summary = RunSummary::new(job.name(), strategy, &target);

        info!(
            run_id = %summary.run_id,
            job = job.name(),
            source = job.source_collection(),
            target = %target,
            strategy = %strategy,
            "sync started"
        );

        let sources = self.db.list_documents(job.source_collection())?;
        info!(count = sources.len(), "source records fetched");

        let existing = match strategy {
            ReplaceStrategy::IncrementalDedup => self.existing_keys(job, &target)?,
            ReplaceStrategy::FullRebuild => HashSet::new(),
        };

        let write_collection = match strategy {
            ReplaceStrategy::IncrementalDedup => target.clone(),
            ReplaceStrategy::FullRebuild => {
                let shadow = self.shadow_of(&target);
                let stale = self.clear_collection(&shadow)?;
                if stale > 0 {
                    warn!(shadow = %shadow, stale, "cleared leftovers of an aborted rebuild");
                }
                shadow
            }
        };

        let mut writer = BatchWriter::with_limit(self.db, self.batch_size);

        for source in &sources {
            summary.processed += 1;

            if strategy == ReplaceStrategy::IncrementalDedup
                && existing.contains(&job.source_key(source))
            {
                summary.already_imported += 1;
                continue;
            }

            match job.derive(source) {
                Ok(RecordOutcome::Derived(docs)) => {
                    for doc in docs {
                        debug!(record = %source.id, derived = %doc.id, "derived document");
                        writer.set(&write_collection, &doc.id, doc.data)?;
                        summary.written += 1;
                    }
                }
                Ok(RecordOutcome::Skipped(reason)) => {
                    debug!(record = %source.id, reason = ?reason, "record skipped");
                    summary.record_skip(reason);
                }
                Err(RecordError::Store(e)) => return Err(e.into()),
                Err(e) => {
                    warn!(record = %source.id, error = %e, "record failed");
                    summary.record_error(&source.id);
                }
            }
        }

        let stats = writer.finish()?;
        summary.commits = stats.commits;

        if strategy == ReplaceStrategy::FullRebuild {
            summary.replaced = self.db.promote_collection(&write_collection, &target)?;
            info!(target = %target, replaced = summary.replaced, "rebuild promoted");
        }

        summary.finished_at = Some(Utc::now());
        info!(
            run_id = %summary.run_id,
            processed = summary.processed,
            written = summary.written,
            errors = summary.errors,
            commits = summary.commits,
            "sync finished"
        );

        Ok(summary)
    }

    /// Staging collection used while rebuilding `target`.
    pub fn shadow_of(&self, target: &str) -> String {
        format!("{}{}", target, self.shadow_suffix)
    }

    fn existing_keys<J: ReconcileJob>(&self, job: &J, target: &str) -> DbResult<HashSet<String>> {
        let Some(tag) = job.dedup_tag() else {
            return Ok(HashSet::new());
        };
        let keys: HashSet<String> = self
            .db
            .find_by_field(target, "source", tag)?
            .iter()
            .filter_map(|doc| job.existing_key(doc))
            .collect();
        info!(tag, count = keys.len(), "dedup index built");
        Ok(keys)
    }

    /// Delete every document of a collection in capped batches.
    pub fn clear_collection(&self, collection: &str) -> DbResult<usize> {
        let docs = self.db.list_documents(collection)?;
        let mut writer = BatchWriter::with_limit(self.db, self.batch_size);
        for doc in &docs {
            writer.delete(collection, &doc.id)?;
        }
        writer.finish()?;
        Ok(docs.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Document;
    use crate::sync::{DerivedDocument, SkipReason};
    use serde_json::json;

    /// Copies `value` into the target. Odd values are skipped, "broken" yields
    /// a body the store rejects, any other non-number is a record error.
    struct EchoJob {
        strategy: ReplaceStrategy,
    }

    impl ReconcileJob for EchoJob {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn source_collection(&self) -> &str {
            "src"
        }

        fn target_collection(&self) -> &str {
            "dst"
        }

        fn strategy(&self) -> ReplaceStrategy {
            self.strategy
        }

        fn dedup_tag(&self) -> Option<&str> {
            Some("echo")
        }

        fn existing_key(&self, derived: &Document) -> Option<String> {
            derived.data["from"].as_str().map(String::from)
        }

        fn derive(&mut self, source: &Document) -> Result<RecordOutcome, RecordError> {
            if source.data["value"] == "broken" {
                return Ok(RecordOutcome::Derived(vec![DerivedDocument {
                    id: format!("d-{}", source.id),
                    data: json!(["not", "an", "object"]),
                }]));
            }
            match source.data["value"].as_i64() {
                Some(v) if v % 2 == 1 => Ok(RecordOutcome::Skipped(SkipReason::NoValues)),
                Some(v) => Ok(RecordOutcome::Derived(vec![DerivedDocument {
                    id: format!("d-{}", source.id),
                    data: json!({"source": "echo", "from": source.id, "value": v}),
                }])),
                None => Err(RecordError::MissingDate),
            }
        }
    }

    fn seed(db: &Database, n: i64) {
        for i in 0..n {
            db.set_document("src", &format!("s{:04}", i), &json!({"value": i * 2}))
                .unwrap();
        }
    }

    #[test]
    fn test_incremental_run_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        seed(&db, 5);
        let driver = SyncDriver::new(&db, 400, "__rebuild");
        let mut job = EchoJob {
            strategy: ReplaceStrategy::IncrementalDedup,
        };

        let first = driver.run(&mut job).unwrap();
        assert_eq!(first.written, 5);

        let second = driver.run(&mut job).unwrap();
        assert_eq!(second.written, 0);
        assert_eq!(second.already_imported, 5);
        assert_eq!(db.count_documents("dst").unwrap(), 5);
    }

    #[test]
    fn test_batches_are_capped() {
        let db = Database::open_in_memory().unwrap();
        seed(&db, 25);
        let driver = SyncDriver::new(&db, 10, "__rebuild");
        let mut job = EchoJob {
            strategy: ReplaceStrategy::IncrementalDedup,
        };

        let summary = driver.run(&mut job).unwrap();
        assert_eq!(summary.written, 25);
        assert_eq!(summary.commits, 3);
    }

    #[test]
    fn test_skips_and_errors_are_counted() {
        let db = Database::open_in_memory().unwrap();
        db.set_document("src", "odd", &json!({"value": 3})).unwrap();
        db.set_document("src", "bad", &json!({"value": "x"})).unwrap();
        db.set_document("src", "even", &json!({"value": 4})).unwrap();
        let driver = SyncDriver::new(&db, 400, "__rebuild");

        let summary = driver
            .run(&mut EchoJob {
                strategy: ReplaceStrategy::IncrementalDedup,
            })
            .unwrap();

        assert_eq!(summary.processed, 3);
        assert_eq!(summary.written, 1);
        assert_eq!(summary.skipped(SkipReason::NoValues), 1);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.error_ids, vec!["bad"]);
    }

    #[test]
    fn test_full_rebuild_replaces_target() {
        let db = Database::open_in_memory().unwrap();
        seed(&db, 3);
        db.set_document("dst", "stale", &json!({"source": "old"})).unwrap();
        db.set_document("dst__rebuild", "leftover", &json!({})).unwrap();
        let driver = SyncDriver::new(&db, 400, "__rebuild");

        let summary = driver
            .run(&mut EchoJob {
                strategy: ReplaceStrategy::FullRebuild,
            })
            .unwrap();

        assert_eq!(summary.replaced, 1);
        assert_eq!(summary.written, 3);
        assert!(db.get_document("dst", "stale").unwrap().is_none());
        assert_eq!(db.count_documents("dst").unwrap(), 3);
        assert_eq!(db.count_documents("dst__rebuild").unwrap(), 0);
    }

    #[test]
    fn test_failed_rebuild_keeps_target_until_next_run() {
        let db = Database::open_in_memory().unwrap();
        seed(&db, 2);
        db.set_document("src", "s0002", &json!({"value": "broken"}))
            .unwrap();
        db.set_document("dst", "keep", &json!({"source": "old"})).unwrap();
        let driver = SyncDriver::new(&db, 2, "__rebuild");
        assert_eq!(driver.shadow_of("dst"), "dst__rebuild");

        let failed = driver.run(&mut EchoJob {
            strategy: ReplaceStrategy::FullRebuild,
        });
        assert!(failed.is_err());
        assert_eq!(db.count_documents("dst").unwrap(), 1);
        assert!(db.get_document("dst", "keep").unwrap().is_some());
        assert_eq!(db.count_documents("dst__rebuild").unwrap(), 2);

        driver.clear_collection("src").unwrap();
        seed(&db, 2);
        let summary = driver
            .run(&mut EchoJob {
                strategy: ReplaceStrategy::FullRebuild,
            })
            .unwrap();

        assert_eq!(summary.replaced, 1);
        assert_eq!(db.count_documents("dst__rebuild").unwrap(), 0);
        assert_eq!(db.count_documents("dst").unwrap(), 2);
        assert!(db.get_document("dst", "keep").unwrap().is_none());
    }

    #[test]
    fn test_clear_collection() {
        let db = Database::open_in_memory().unwrap();
        seed(&db, 12);
        let driver = SyncDriver::new(&db, 5, "__rebuild");
        assert_eq!(driver.clear_collection("src").unwrap(), 12);
        assert_eq!(db.count_documents("src").unwrap(), 0);
    }
}
