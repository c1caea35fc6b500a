//! Vaccination records rebuilt from services.

use chrono::{DateTime, Utc};
use tracing::info;

use super::{
    DerivedDocument, RecordError, RecordOutcome, ReconcileJob, ReplaceStrategy, RunSummary,
    SkipReason, SyncDriver, SyncResult, VaccinationReport,
};
use crate::config::SyncConfig;
use crate::db::{Database, Document};
use crate::linker::{LinkOutcome, PatientDirectory, PatientLinker, ProtocolIndex};
use crate::models::{MatchMethod, ServiceRecord};
use crate::provenance::{RecordBuilder, VaccinationFacts};
use crate::vaccine::{is_vaccination_group, unknown_identity, VaccineMatch, VaccineResolver};

/// `services` → vaccination collection, regenerated from scratch on every run.
pub struct VaccinationJob<'a> {
    name: &'static str,
    source: String,
    target: String,
    resolver: VaccineResolver,
    linker: PatientLinker,
    builder: RecordBuilder,
    directory: PatientDirectory<'a>,
    now: DateTime<Utc>,
}

impl<'a> VaccinationJob<'a> {
    /// Trust only the patient id carried by each service. Writes `vaccinations`.
    pub fn from_services(db: &'a Database, config: &SyncConfig, resolver: VaccineResolver) -> Self {
        Self::build(
            db,
            config,
            resolver,
            PatientLinker::direct_only(),
            "vaccinations",
            config.vaccinations_collection.clone(),
        )
    }

    /// Fall back to the protocol join for services without a patient id.
    /// Writes `vaccination_records`.
    pub fn via_protocols(
        db: &'a Database,
        config: &SyncConfig,
        resolver: VaccineResolver,
    ) -> SyncResult<Self> {
        let index = ProtocolIndex::load(db, &config.protocols_collection)?;
        info!(
            protocols = index.len(),
            without_patient = index.skipped(),
            "protocol index built"
        );
        Ok(Self::build(
            db,
            config,
            resolver,
            PatientLinker::with_protocols(index),
            "vaccination-records",
            config.vaccination_records_collection.clone(),
        ))
    }

    fn build(
        db: &'a Database,
        config: &SyncConfig,
        resolver: VaccineResolver,
        linker: PatientLinker,
        name: &'static str,
        target: String,
    ) -> Self {
        Self {
            name,
            source: config.services_collection.clone(),
            target,
            resolver,
            linker,
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

    /// Decide whether a service is a vaccination and which one.
    fn identify(&self, service: &ServiceRecord) -> Option<VaccineMatch> {
        let name = service.service_name.as_deref().unwrap_or("");
        if let Some(found) = self.resolver.classify(name) {
            return Some(found);
        }

        let group = service.group.as_deref()?;
        if !is_vaccination_group(group) {
            return None;
        }
        let original = if name.trim().is_empty() { group } else { name };
        Some(VaccineMatch {
            identity: unknown_identity(original),
            method: MatchMethod::Group,
        })
    }
}

impl ReconcileJob for VaccinationJob<'_> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn source_collection(&self) -> &str {
        &self.source
    }

    fn target_collection(&self) -> &str {
        &self.target
    }

    fn strategy(&self) -> ReplaceStrategy {
        ReplaceStrategy::FullRebuild
    }

    fn derive(&mut self, source: &Document) -> Result<RecordOutcome, RecordError> {
        let service = ServiceRecord::from_document(source);

        let Some(vaccine) = self.identify(&service) else {
            return Ok(RecordOutcome::Skipped(SkipReason::NotVaccine));
        };

        let patient = match self.linker.link(&service) {
            LinkOutcome::Direct(p) | LinkOutcome::ViaProtocol(p) => p,
            LinkOutcome::Unresolved { .. } if self.linker.protocols().is_some() => {
                return Ok(RecordOutcome::Skipped(SkipReason::ProtocolNotFound));
            }
            LinkOutcome::Unresolved { .. } => {
                return Ok(RecordOutcome::Skipped(SkipReason::MissingPatient));
            }
        };

        let date = service.date.ok_or(RecordError::MissingDate)?;

        let patient_name = match patient.patient_name {
            Some(name) => name,
            None => self
                .directory
                .name(&patient.patient_id)?
                .unwrap_or_default(),
        };

        let derived = self.builder.vaccination(
            &VaccinationFacts {
                service: &service,
                patient_id: &patient.patient_id,
                patient_name: &patient_name,
                vaccine: &vaccine,
                date,
            },
            self.now,
        );

        Ok(RecordOutcome::Derived(vec![DerivedDocument {
            id: derived.id,
            data: serde_json::to_value(&derived.record)?,
        }]))
    }
}

/// Outcome of a vaccination sync: run counters plus the re-queried target.
#[derive(Debug, Clone)]
pub struct VaccinationSync {
    pub summary: RunSummary,
    pub report: VaccinationReport,
}

/// Rebuild vaccinations from services. With `via_protocols`, services without a
/// patient id are linked through `protocols` and the result goes to
/// `vaccination_records`; otherwise they are dropped and the result goes to
/// `vaccinations`.
pub fn sync_vaccinations(
    db: &Database,
    config: &SyncConfig,
    resolver: VaccineResolver,
    via_protocols: bool,
) -> SyncResult<VaccinationSync> {
    config.validate()?;
    let driver = SyncDriver::new(db, config.batch_size, config.shadow_suffix.clone());

    let mut job = if via_protocols {
        VaccinationJob::via_protocols(db, config, resolver)?
    } else {
        VaccinationJob::from_services(db, config, resolver)
    };

    let summary = driver.run(&mut job)?;
    let report = VaccinationReport::collect(db, job.target_collection())?;
    Ok(VaccinationSync { summary, report })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn seed(db: &Database) {
        db.set_document(
            "services",
            "s1",
            &json!({"serviceName": "Rotarix 1.doz", "patientId": "P1", "date": "2024-02-01"}),
        )
        .unwrap();
        db.set_document(
            "services",
            "s2",
            &json!({"serviceName": "Hemogram", "patientId": "P1", "date": "2024-02-01"}),
        )
        .unwrap();
        db.set_document(
            "services",
            "s3",
            &json!({
                "serviceName": "Özel uygulama",
                "Grup_Adi": "Aşılama",
                "Protokol_No": "1042",
                "date": "2024-02-03"
            }),
        )
        .unwrap();
        db.set_document("protocols", "protocol_1042", &json!({"patientId": "P9"}))
            .unwrap();
        db.set_document("patients", "P9", &json!({"name": "Deniz Kaya"}))
            .unwrap();
    }

    #[test]
    fn test_from_services_drops_services_without_patient() {
        let db = Database::open_in_memory().unwrap();
        seed(&db);

        let run = sync_vaccinations(&db, &SyncConfig::default(), VaccineResolver::default(), false)
            .unwrap();

        assert_eq!(run.summary.written, 1);
        assert_eq!(run.summary.skipped(SkipReason::NotVaccine), 1);
        assert_eq!(run.summary.skipped(SkipReason::MissingPatient), 1);
        assert_eq!(db.count_documents("vaccinations").unwrap(), 1);
    }

    #[test]
    fn test_via_protocols_links_and_names_patient() {
        let db = Database::open_in_memory().unwrap();
        seed(&db);

        let run = sync_vaccinations(&db, &SyncConfig::default(), VaccineResolver::default(), true)
            .unwrap();
        assert_eq!(run.summary.written, 2);
        assert_eq!(run.summary.target, "vaccination_records");

        let linked = db
            .find_by_field("vaccination_records", "patientId", "P9")
            .unwrap();
        assert_eq!(linked.len(), 1);
        let v = &linked[0].data;
        assert_eq!(v["patientName"], "Deniz Kaya");
        assert_eq!(v["vaccineType"], "unknown");
        assert_eq!(v["vaccineName"], "Özel uygulama");
        assert_eq!(v["metadata"]["matchMethod"], "group");
        assert_eq!(v["protocolNo"], "1042");
    }

    #[test]
    fn test_unresolved_protocol_is_counted() {
        let db = Database::open_in_memory().unwrap();
        db.set_document(
            "services",
            "s1",
            &json!({"serviceName": "Prevenar 13", "Protokol_No": "777", "date": "2024-02-01"}),
        )
        .unwrap();

        let run = sync_vaccinations(&db, &SyncConfig::default(), VaccineResolver::default(), true)
            .unwrap();
        assert_eq!(run.summary.skipped(SkipReason::ProtocolNotFound), 1);
        assert_eq!(run.summary.written, 0);
    }

    #[test]
    fn test_missing_service_date_is_a_record_error() {
        let db = Database::open_in_memory().unwrap();
        db.set_document(
            "services",
            "s1",
            &json!({"serviceName": "Rotarix", "patientId": "P1"}),
        )
        .unwrap();

        let run = sync_vaccinations(&db, &SyncConfig::default(), VaccineResolver::default(), false)
            .unwrap();
        assert_eq!(run.summary.errors, 1);
        assert_eq!(db.count_documents("vaccinations").unwrap(), 0);
    }

    #[test]
    fn test_rebuild_drops_documents_without_source() {
        let db = Database::open_in_memory().unwrap();
        seed(&db);
        db.set_document("vaccinations", "orphan", &json!({"vaccineType": "bcg"}))
            .unwrap();

        let run = sync_vaccinations(&db, &SyncConfig::default(), VaccineResolver::default(), false)
            .unwrap();
        assert_eq!(run.summary.replaced, 1);
        assert!(db.get_document("vaccinations", "orphan").unwrap().is_none());
    }
}
