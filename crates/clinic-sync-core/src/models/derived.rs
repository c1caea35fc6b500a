//! Documents owned by the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Free-text field of a health record a measurement was extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceField {
    #[serde(rename = "personalHistory")]
    PersonalHistory,
    #[serde(rename = "findings")]
    Findings,
}

impl SourceField {
    pub const ALL: [SourceField; 2] = [SourceField::PersonalHistory, SourceField::Findings];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceField::PersonalHistory => "personalHistory",
            SourceField::Findings => "findings",
        }
    }
}

/// Whether a measurement describes the patient at birth or at a visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementType {
    Birth,
    Visit,
}

impl MeasurementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeasurementType::Birth => "birth",
            MeasurementType::Visit => "visit",
        }
    }
}

/// A growth measurement extracted from a clinical note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedMeasurement {
    pub patient_id: String,
    pub measurement_date: DateTime<Utc>,
    /// Weight in kg
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    /// Height in cm
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    /// Head circumference in cm
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head_circumference: Option<f64>,
    pub notes: String,
    /// Provenance tag, e.g. "health_records"
    pub source: String,
    pub source_field: SourceField,
    pub measurement_type: MeasurementType,
    pub health_record_id: String,
    pub created_at: DateTime<Utc>,
}

/// How a service was recognised as a vaccination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMethod {
    /// A brand/keyword from the vaccine table matched
    Keyword,
    /// Only a generic "vaccine" term matched
    Generic,
    /// Only the service group label marked it as a vaccination
    Group,
}

impl MatchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMethod::Keyword => "keyword",
            MatchMethod::Generic => "generic",
            MatchMethod::Group => "group",
        }
    }
}

/// Audit metadata carried by every derived vaccination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaccinationMetadata {
    /// Source collection, e.g. "services"
    pub source: String,
    pub service_id: String,
    pub grup_adi: Option<String>,
    pub match_method: MatchMethod,
    pub imported_at: DateTime<Utc>,
}

/// A vaccination derived from a service record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedVaccination {
    pub patient_id: String,
    pub patient_name: String,
    pub vaccine_type: String,
    pub vaccine_name: String,
    pub original_service_name: String,
    pub protocol_no: Option<String>,
    pub date: DateTime<Utc>,
    pub provider: String,
    pub location: String,
    pub dose: Option<u32>,
    pub notes: String,
    pub side_effects: Vec<String>,
    pub metadata: VaccinationMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_measurement_serialization_shape() {
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let m = DerivedMeasurement {
            patient_id: "P1".into(),
            measurement_date: at,
            weight: Some(3.5),
            height: Some(50.0),
            head_circumference: None,
            notes: "doğum kilosu 3.5 kg".into(),
            source: "health_records".into(),
            source_field: SourceField::PersonalHistory,
            measurement_type: MeasurementType::Birth,
            health_record_id: "hr1".into(),
            created_at: at,
        };

        let value = serde_json::to_value(&m).unwrap();
        assert_eq!(value["patientId"], "P1");
        assert_eq!(value["sourceField"], "personalHistory");
        assert_eq!(value["measurementType"], "birth");
        assert_eq!(value["healthRecordId"], "hr1");
        assert_eq!(value["weight"], 3.5);
        assert!(value.get("headCircumference").is_none());

        let back: DerivedMeasurement = serde_json::from_value(value).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn test_vaccination_metadata_shape() {
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let metadata = VaccinationMetadata {
            source: "services".into(),
            service_id: "s1".into(),
            grup_adi: Some("Aşılama".into()),
            match_method: MatchMethod::Group,
            imported_at: at,
        };

        let value = serde_json::to_value(&metadata).unwrap();
        assert_eq!(value["serviceId"], "s1");
        assert_eq!(value["grupAdi"], "Aşılama");
        assert_eq!(value["matchMethod"], "group");
    }
}
