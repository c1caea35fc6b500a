//! Provenance-tagged construction of derived documents.
//!
//! Every derived document records where it came from (collection, document id,
//! field) so reruns can skip what was already imported and audits can trace a
//! value back to its note. Document ids are derived from that provenance, so a
//! given source fact always maps to the same derived document.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::extract::ExtractedValues;
use crate::models::{
    DerivedMeasurement, DerivedVaccination, MeasurementType, ServiceRecord, SourceField,
    VaccinationMetadata,
};
use crate::vaccine::{parse_dose, VaccineMatch};

const MAX_NOTE_CHARS: usize = 500;

/// A derived record together with its document id.
#[derive(Debug, Clone, PartialEq)]
pub struct Derived<T> {
    pub id: String,
    pub record: T,
}

/// Everything extracted for one `(health record, field)` pair.
#[derive(Debug, Clone, Copy)]
pub struct MeasurementFacts<'a> {
    pub health_record_id: &'a str,
    pub patient_id: &'a str,
    pub field: SourceField,
    pub text: &'a str,
    pub values: ExtractedValues,
    pub measurement_type: MeasurementType,
    pub measurement_date: DateTime<Utc>,
}

/// Everything resolved for one vaccination service.
#[derive(Debug, Clone, Copy)]
pub struct VaccinationFacts<'a> {
    pub service: &'a ServiceRecord,
    pub patient_id: &'a str,
    pub patient_name: &'a str,
    pub vaccine: &'a VaccineMatch,
    pub date: DateTime<Utc>,
}

/// Builds derived documents stamped with their source.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    measurement_source: String,
    vaccination_source: String,
    default_provider: String,
    location: String,
}

impl RecordBuilder {
    pub fn new(
        measurement_source: impl Into<String>,
        vaccination_source: impl Into<String>,
        default_provider: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            measurement_source: measurement_source.into(),
            vaccination_source: vaccination_source.into(),
            default_provider: default_provider.into(),
            location: location.into(),
        }
    }

    /// Provenance tag stamped on measurements.
    pub fn measurement_source(&self) -> &str {
        &self.measurement_source
    }

    pub fn measurement(
        &self,
        facts: &MeasurementFacts<'_>,
        created_at: DateTime<Utc>,
    ) -> Derived<DerivedMeasurement> {
        let id = derived_document_id(&[
            &self.measurement_source,
            facts.health_record_id,
            facts.field.as_str(),
        ]);

        Derived {
            id,
            record: DerivedMeasurement {
                patient_id: facts.patient_id.to_string(),
                measurement_date: facts.measurement_date,
                weight: facts.values.weight,
                height: facts.values.height,
                head_circumference: facts.values.head_circumference,
                notes: truncate_note(facts.text),
                source: self.measurement_source.clone(),
                source_field: facts.field,
                measurement_type: facts.measurement_type,
                health_record_id: facts.health_record_id.to_string(),
                created_at,
            },
        }
    }

    pub fn vaccination(
        &self,
        facts: &VaccinationFacts<'_>,
        imported_at: DateTime<Utc>,
    ) -> Derived<DerivedVaccination> {
        let service = facts.service;
        let original = service.service_name.clone().unwrap_or_default();
        let id = derived_document_id(&[&self.vaccination_source, &service.id]);

        let notes = match &service.protocol_no {
            Some(protocol) => format!("Hizmet kaydından aktarıldı (protokol {})", protocol),
            None => "Hizmet kaydından aktarıldı".to_string(),
        };

        Derived {
            id,
            record: DerivedVaccination {
                patient_id: facts.patient_id.to_string(),
                patient_name: facts.patient_name.to_string(),
                vaccine_type: facts.vaccine.identity.vaccine_type.clone(),
                vaccine_name: facts.vaccine.identity.standard_name.clone(),
                dose: parse_dose(&original),
                original_service_name: original,
                protocol_no: service.protocol_no.clone(),
                date: facts.date,
                provider: service
                    .provider
                    .clone()
                    .unwrap_or_else(|| self.default_provider.clone()),
                location: self.location.clone(),
                notes,
                side_effects: Vec::new(),
                metadata: VaccinationMetadata {
                    source: self.vaccination_source.clone(),
                    service_id: service.id.clone(),
                    grup_adi: service.group.clone(),
                    match_method: facts.vaccine.method,
                    imported_at,
                },
            },
        }
    }
}

/// Stable document id for a provenance path.
pub fn derived_document_id(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(parts.join("/").as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..16])
}

fn truncate_note(text: &str) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(MAX_NOTE_CHARS) {
        Some((cut, _)) => trimmed[..cut].to_string(),
        None => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MatchMethod;
    use crate::vaccine::VaccineIdentity;
    use chrono::TimeZone;

    fn builder() -> RecordBuilder {
        RecordBuilder::new("health_records", "services", "Klinik", "Merkez")
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_measurement_is_stamped() {
        let facts = MeasurementFacts {
            health_record_id: "hr1",
            patient_id: "P1",
            field: SourceField::PersonalHistory,
            text: "  Doğum kilosu 3.5 kg ",
            values: ExtractedValues {
                weight: Some(3.5),
                height: None,
                head_circumference: None,
            },
            measurement_type: MeasurementType::Birth,
            measurement_date: at(),
        };
        let derived = builder().measurement(&facts, at());

        assert_eq!(derived.record.source, "health_records");
        assert_eq!(derived.record.source_field, SourceField::PersonalHistory);
        assert_eq!(derived.record.health_record_id, "hr1");
        assert_eq!(derived.record.notes, "Doğum kilosu 3.5 kg");
        assert_eq!(derived.id.len(), 32);
    }

    #[test]
    fn test_measurement_ids_differ_by_field() {
        let a = derived_document_id(&["health_records", "hr1", "personalHistory"]);
        let b = derived_document_id(&["health_records", "hr1", "findings"]);
        let c = derived_document_id(&["health_records", "hr1", "personalHistory"]);
        assert_ne!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn test_vaccination_is_stamped() {
        let service = ServiceRecord {
            id: "s1".into(),
            service_name: Some("Rotarix 1.doz".into()),
            group: Some("Aşılama".into()),
            protocol_no: Some("1042".into()),
            patient_id: None,
            patient_name: None,
            provider: None,
            date: Some(at()),
        };
        let vaccine = VaccineMatch {
            identity: VaccineIdentity {
                vaccine_type: "rotavirus".into(),
                standard_name: "Rotavirüs".into(),
            },
            method: MatchMethod::Keyword,
        };
        let facts = VaccinationFacts {
            service: &service,
            patient_id: "P9",
            patient_name: "Deniz",
            vaccine: &vaccine,
            date: at(),
        };
        let derived = builder().vaccination(&facts, at());
        let v = &derived.record;

        assert_eq!(v.vaccine_type, "rotavirus");
        assert_eq!(v.vaccine_name, "Rotavirüs");
        assert_eq!(v.original_service_name, "Rotarix 1.doz");
        assert_eq!(v.dose, Some(1));
        assert_eq!(v.provider, "Klinik");
        assert_eq!(v.location, "Merkez");
        assert_eq!(v.protocol_no.as_deref(), Some("1042"));
        assert!(v.side_effects.is_empty());
        assert_eq!(v.metadata.service_id, "s1");
        assert_eq!(v.metadata.source, "services");
        assert_eq!(v.metadata.grup_adi.as_deref(), Some("Aşılama"));
        assert_eq!(derived.id, derived_document_id(&["services", "s1"]));
    }

    #[test]
    fn test_truncate_note_is_char_safe() {
        let long = "ğ".repeat(MAX_NOTE_CHARS + 10);
        assert_eq!(truncate_note(&long).chars().count(), MAX_NOTE_CHARS);
        assert_eq!(truncate_note("kısa"), "kısa");
    }
}
