//! Clinic-Sync Core Library
//!
//! Offline reconciliation of a pediatric clinic's document store: structured
//! growth measurements and vaccination records are derived from free-text notes
//! and loosely structured service records.
//!
//! # Architecture
//!
//! ```text
//! health_records ──▶ Value Extractor ──▶ Birth/Visit Classifier ─┐
//!                                                                │
//! services ──▶ Vaccine Resolver ──▶ Protocol→Patient Linker ─────┤
//!                                                                ▼
//!                                                  Provenance Record Builder
//!                                                                │
//!                                         ┌──────────────────────▼──────────────────────┐
//!                                         │        Batch Reconciliation Driver          │
//!                                         │  IncrementalDedup  │  FullRebuild (shadow)  │
//!                                         │       ≤400 writes per atomic commit         │
//!                                         └──────────────────────┬──────────────────────┘
//!                                                                │
//!                              ┌─────────────────────────────────┼──────────────────────┐
//!                              ▼                                 ▼                      ▼
//!                     growthMeasurements                   vaccinations       vaccination_records
//! ```
//!
//! # Core Principle
//!
//! **Source collections are read-only.** Every derived document carries its
//! provenance (`source`, `sourceField`, `healthRecordId` or `serviceId`) and a
//! document id computed from it, so reruns are idempotent.
//!
//! # Modules
//!
//! - [`db`]: SQLite-backed document store with capped atomic write batches
//! - [`models`]: Source views, derived documents and timestamp parsing
//! - [`extract`]: Unit-aware value extraction and birth-context detection
//! - [`vaccine`]: Vaccine identity resolution from service names
//! - [`provenance`]: Construction of provenance-tagged derived documents
//! - [`linker`]: Protocol-to-patient identity linking and patient lookups
//! - [`sync`]: Reconciliation jobs, purge and reports
//! - [`config`]: Collection names and job constants

pub mod config;
pub mod db;
pub mod extract;
pub mod linker;
pub mod models;
pub mod provenance;
pub mod sync;
pub mod vaccine;

// Re-export commonly used types
pub use config::{ConfigError, SyncConfig};
pub use db::{Database, DbError, Document, MAX_BATCH_WRITES};
pub use extract::{ExtractedValues, FieldKind, MatchPolicy, ValueExtractor};
pub use linker::{LinkOutcome, PatientLinker, ProtocolIndex};
pub use models::{parse_flexible_timestamp, DerivedMeasurement, DerivedVaccination};
pub use provenance::RecordBuilder;
pub use sync::{
    purge_by_source, sync_measurements, sync_vaccinations, MeasurementReport, ReplaceStrategy,
    RunSummary, SkipReason, SyncError, VaccinationReport,
};
pub use vaccine::{VaccineIdentity, VaccineResolver, VaccineTable};
