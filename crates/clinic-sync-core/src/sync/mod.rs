//! Batch reconciliation jobs.
//!
//! Every job runs the same phases:
//!
//! ```text
//! FETCH_SOURCE → FETCH_EXISTING (dedup) → ITERATE → ACCUMULATE → FLUSH (≤400/commit) → REPORT
//! ```
//!
//! Two write strategies exist:
//! - [`ReplaceStrategy::IncrementalDedup`]: append new derived documents, skipping
//!   source records already imported under the same provenance tag.
//! - [`ReplaceStrategy::FullRebuild`]: regenerate the whole target. New documents
//!   are staged in a shadow collection and promoted in one transaction, so an
//!   aborted run leaves the previous target untouched.

mod driver;
mod measurements;
mod purge;
mod report;
mod vaccinations;

pub use driver::*;
pub use measurements::*;
pub use purge::*;
pub use report::*;
pub use vaccinations::*;

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::config::ConfigError;
use crate::db::{DbError, Document};
use crate::vaccine::TableError;

/// Job-level errors. Any of these aborts the run.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Vaccine table error: {0}")]
    Table(#[from] TableError),
}

pub type SyncResult<T> = Result<T, SyncError>;

/// Problems with a single source record. The record is skipped and counted;
/// only [`RecordError::Store`] aborts the run.
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("no usable date")]
    MissingDate,

    #[error("no patient id")]
    MissingPatient,

    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("store lookup failed: {0}")]
    Store(#[from] DbError),
}

/// How a job writes its target collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ReplaceStrategy {
    IncrementalDedup,
    FullRebuild,
}

impl fmt::Display for ReplaceStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplaceStrategy::IncrementalDedup => write!(f, "incremental-dedup"),
            ReplaceStrategy::FullRebuild => write!(f, "full-rebuild"),
        }
    }
}

/// Why a source record produced nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    /// No field produced a plausible measurement
    NoValues,
    /// The service is not a vaccination
    NotVaccine,
    /// The service carries no patient id and protocol linking is off
    MissingPatient,
    /// Protocol linking found no patient
    ProtocolNotFound,
}

impl SkipReason {
    /// Operator-facing label.
    pub fn label(&self) -> &'static str {
        match self {
            SkipReason::NoValues => "Ölçüm bulunamadı",
            SkipReason::NotVaccine => "Aşı değil",
            SkipReason::MissingPatient => "Hasta bulunamadı",
            SkipReason::ProtocolNotFound => "Protocol bulunamadı",
        }
    }
}

/// A derived document ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedDocument {
    pub id: String,
    pub data: Value,
}

/// What a job made of one source record.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    Derived(Vec<DerivedDocument>),
    Skipped(SkipReason),
}

/// A reconciliation job driven by [`SyncDriver`].
pub trait ReconcileJob {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    fn source_collection(&self) -> &str;

    fn target_collection(&self) -> &str;

    fn strategy(&self) -> ReplaceStrategy;

    /// Provenance tag whose derived documents form the dedup index.
    fn dedup_tag(&self) -> Option<&str> {
        None
    }

    /// Source key recorded by an already-derived document.
    fn existing_key(&self, _derived: &Document) -> Option<String> {
        None
    }

    /// Key of a source record, compared against [`ReconcileJob::existing_key`].
    fn source_key(&self, source: &Document) -> String {
        source.id.clone()
    }

    /// Turn one source record into zero or more derived documents.
    fn derive(&mut self, source: &Document) -> Result<RecordOutcome, RecordError>;
}

/// Counters for one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub run_id: Uuid,
    pub job: String,
    pub strategy: ReplaceStrategy,
    pub target: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Source records read
    pub processed: usize,
    /// Derived documents written
    pub written: usize,
    /// Source records skipped because they were imported by an earlier run
    pub already_imported: usize,
    pub skipped: BTreeMap<SkipReason, usize>,
    /// Source records that failed and were skipped
    pub errors: usize,
    pub error_ids: Vec<String>,
    /// Batch commits issued
    pub commits: usize,
    /// Documents the target held before a full rebuild replaced them
    pub replaced: usize,
}

impl RunSummary {
    pub fn new(job: &str, strategy: ReplaceStrategy, target: &str) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            job: job.to_string(),
            strategy,
            target: target.to_string(),
            started_at: Utc::now(),
            finished_at: None,
            processed: 0,
            written: 0,
            already_imported: 0,
            skipped: BTreeMap::new(),
            errors: 0,
            error_ids: Vec::new(),
            commits: 0,
            replaced: 0,
        }
    }

    pub fn skipped(&self, reason: SkipReason) -> usize {
        self.skipped.get(&reason).copied().unwrap_or(0)
    }

    fn record_skip(&mut self, reason: SkipReason) {
        *self.skipped.entry(reason).or_insert(0) += 1;
    }

    fn record_error(&mut self, id: &str) {
        self.errors += 1;
        self.error_ids.push(id.to_string());
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== {} özeti ({}) ===", self.job, self.strategy)?;
        writeln!(f, "Hedef koleksiyon:        {}", self.target)?;
        writeln!(f, "İşlenen kayıt:           {}", self.processed)?;
        writeln!(f, "Yazılan kayıt:           {}", self.written)?;
        if self.strategy == ReplaceStrategy::IncrementalDedup {
            writeln!(f, "Zaten aktarılmış:        {}", self.already_imported)?;
        } else {
            writeln!(f, "Silinen (değiştirilen):  {}", self.replaced)?;
        }
        for (reason, count) in &self.skipped {
            writeln!(f, "{:<25}{}", format!("{}:", reason.label()), count)?;
        }
        writeln!(f, "Hatalı kayıt:            {}", self.errors)?;
        if !self.error_ids.is_empty() {
            writeln!(f, "Hatalı kayıt id'leri:    {}", self.error_ids.join(", "))?;
        }
        write!(f, "Batch commit sayısı:     {}", self.commits)
    }
}
