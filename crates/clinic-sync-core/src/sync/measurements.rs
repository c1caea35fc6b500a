//! Growth measurements from clinical notes.

use chrono::{DateTime, Utc};

use super::{
    DerivedDocument, RecordError, RecordOutcome, ReconcileJob, ReplaceStrategy, SkipReason,
    SyncDriver, SyncResult,
};
use crate::config::SyncConfig;
use crate::db::{Database, Document};
use crate::extract::{classify_measurement, ValueExtractor};
use crate::linker::PatientDirectory;
use crate::models::{HealthRecord, MeasurementType, SourceField};
use crate::provenance::{MeasurementFacts, RecordBuilder};

use super::{MeasurementReport, RunSummary};

/// `health_records` → `growthMeasurements`, appending only unseen records.
pub struct MeasurementJob<'a> {
    source: String,
    target: String,
    extractor: ValueExtractor,
    builder: RecordBuilder,
    directory: PatientDirectory<'a>,
    now: DateTime<Utc>,
}

impl<'a> MeasurementJob<'a> {
    pub fn new(db: &'a Database, config: &SyncConfig) -> Self {
        Self {
            source: config.health_records_collection.clone(),
            target: config.measurements_collection.clone(),
            extractor: ValueExtractor::new(config.match_policy),
            builder: RecordBuilder::new(
                config.measurement_source.clone(),
                config.services_collection.clone(),
                config.default_provider.clone(),
                config.location.clone(),
            ),
            directory: PatientDirectory::new(db, config.patients_collection.clone()),
            now: Utc::now(),
        }
    }

    /// Patient lookups made so far.
    pub fn patient_fetches(&self) -> usize {
        self.directory.fetches()
    }

    fn measurement_date(
        &mut self,
        record: &HealthRecord,
        patient_id: &str,
        kind: MeasurementType,
    ) -> Result<DateTime<Utc>, RecordError> {
        let birth = match kind {
            MeasurementType::Birth => self.directory.birth_date(patient_id)?,
            MeasurementType::Visit => None,
        };
        birth.or(record.date).ok_or(RecordError::MissingDate)
    }
}

impl ReconcileJob for MeasurementJob<'_> {
    fn name(&self) -> &'static str {
        "measurements"
    }

    fn source_collection(&self) -> &str {
        &self.source
    }

    fn target_collection(&self) -> &str {
        &self.target
    }

    fn strategy(&self) -> ReplaceStrategy {
        ReplaceStrategy::IncrementalDedup
    }

    fn dedup_tag(&self) -> Option<&str> {
        Some(self.builder.measurement_source())
    }

    fn existing_key(&self, derived: &Document) -> Option<String> {
        derived.data["healthRecordId"].as_str().map(String::from)
    }

    fn derive(&mut self, source: &Document) -> Result<RecordOutcome, RecordError> {
        let record = HealthRecord::from_document(source);

        let candidates: Vec<(SourceField, &str)> = SourceField::ALL
            .iter()
            .filter_map(|&field| {
                let text = match field {
                    SourceField::PersonalHistory => record.personal_history.as_deref(),
                    SourceField::Findings => record.findings.as_deref(),
                }?;
                Some((field, text))
            })
            .collect();

        let extracted: Vec<_> = candidates
            .into_iter()
            .map(|(field, text)| (field, text, self.extractor.extract_all(text)))
            .filter(|(_, _, values)| !values.is_empty())
            .collect();

        if extracted.is_empty() {
            return Ok(RecordOutcome::Skipped(SkipReason::NoValues));
        }

        let patient_id = record
            .patient_id
            .clone()
            .ok_or(RecordError::MissingPatient)?;

        let mut docs = Vec::with_capacity(extracted.len());
        for (field, text, values) in extracted {
            let measurement_type = classify_measurement(text);
            let measurement_date = self.measurement_date(&record, &patient_id, measurement_type)?;

            let derived = self.builder.measurement(
                &MeasurementFacts {
                    health_record_id: &record.id,
                    patient_id: &patient_id,
                    field,
                    text,
                    values,
                    measurement_type,
                    measurement_date,
                },
                self.now,
            );
            docs.push(DerivedDocument {
                id: derived.id,
                data: serde_json::to_value(&derived.record)?,
            });
        }

        Ok(RecordOutcome::Derived(docs))
    }
}

/// Outcome of a measurement sync: run counters plus the re-queried target.
#[derive(Debug, Clone)]
pub struct MeasurementSync {
    pub summary: RunSummary,
    pub report: MeasurementReport,
}

/// Run the measurement job and report on the resulting collection.
pub fn sync_measurements(db: &Database, config: &SyncConfig) -> SyncResult<MeasurementSync> {
    config.validate()?;
    let driver = SyncDriver::new(db, config.batch_size, config.shadow_suffix.clone());
    let mut job = MeasurementJob::new(db, config);
    let summary = driver.run(&mut job)?;
    let report = MeasurementReport::collect(db, &config.measurements_collection)?;
    Ok(MeasurementSync { summary, report })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn db_with(records: &[(&str, serde_json::Value)]) -> Database {
        let db = Database::open_in_memory().unwrap();
        for (id, data) in records {
            db.set_document("health_records", id, data).unwrap();
        }
        db
    }

    #[test]
    fn test_one_document_per_field() {
        let db = db_with(&[(
            "hr1",
            json!({
                "patientId": "P1",
                "date": "2024-03-01",
                "personalHistory": "Doğum kilosu 3200 gr",
                "findings": "kilo 6,4 kg boy 62 cm"
            }),
        )]);

        let run = sync_measurements(&db, &SyncConfig::default()).unwrap();
        assert_eq!(run.summary.written, 2);

        let docs = db.list_documents("growthMeasurements").unwrap();
        let birth = docs
            .iter()
            .find(|d| d.data["sourceField"] == "personalHistory")
            .unwrap();
        assert_eq!(birth.data["measurementType"], "birth");
        assert_eq!(birth.data["weight"], 3.2);

        let visit = docs.iter().find(|d| d.data["sourceField"] == "findings").unwrap();
        assert_eq!(visit.data["measurementType"], "visit");
        assert_eq!(visit.data["height"], 62.0);
    }

    #[test]
    fn test_birth_measurement_uses_birth_date() {
        let db = db_with(&[(
            "hr1",
            json!({"patientId": "P1", "date": "2024-03-01", "findings": "NSD, 3,1 kg"}),
        )]);
        db.set_document("patients", "P1", &json!({"birthDate": "2024-01-15"}))
            .unwrap();

        sync_measurements(&db, &SyncConfig::default()).unwrap();
        let doc = &db.list_documents("growthMeasurements").unwrap()[0];
        assert!(doc.data["measurementDate"]
            .as_str()
            .unwrap()
            .starts_with("2024-01-15"));
    }

    #[test]
    fn test_missing_date_is_a_record_error() {
        let db = db_with(&[
            ("hr1", json!({"patientId": "P1", "findings": "kilo 9 kg"})),
            ("hr2", json!({"patientId": "P1", "date": "2024-03-01", "findings": "kilo 9 kg"})),
        ]);

        let run = sync_measurements(&db, &SyncConfig::default()).unwrap();
        assert_eq!(run.summary.errors, 1);
        assert_eq!(run.summary.error_ids, vec!["hr1"]);
        assert_eq!(run.summary.written, 1);
    }

    #[test]
    fn test_records_without_values_are_skipped() {
        let db = db_with(&[("hr1", json!({"patientId": "P1", "findings": "öksürük yok"}))]);

        let run = sync_measurements(&db, &SyncConfig::default()).unwrap();
        assert_eq!(run.summary.skipped(SkipReason::NoValues), 1);
        assert_eq!(run.summary.errors, 0);
        assert_eq!(db.count_documents("growthMeasurements").unwrap(), 0);
    }

    #[test]
    fn test_patient_lookups_are_cached() {
        let db = db_with(&[
            ("hr1", json!({"patientId": "P1", "date": "2024-03-01", "findings": "doğumda 3 kg"})),
            ("hr2", json!({"patientId": "P1", "date": "2024-03-02", "findings": "doğumda 3 kg"})),
        ]);
        let config = SyncConfig::default();
        let driver = SyncDriver::new(&db, 400, "__rebuild");
        let mut job = MeasurementJob::new(&db, &config);

        driver.run(&mut job).unwrap();
        assert_eq!(job.patient_fetches(), 1);
    }
}
