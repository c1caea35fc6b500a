//! Read-only views over upstream clinic documents.
//!
//! Upstream documents are loosely structured: the same fact may live under
//! several field names, identifiers may be strings or numbers, and dates come in
//! several shapes. These views pick the first usable value and never fail.

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::parse_flexible_timestamp;
use crate::db::Document;

/// Field names tried, in order, when looking for a record's date.
pub const RECORD_DATE_FIELDS: &[&str] = &[
    "date",
    "visitDate",
    "recordDate",
    "serviceDate",
    "Tarih",
    "createdAt",
];

const BIRTH_DATE_FIELDS: &[&str] = &["birthDate", "dateOfBirth", "dogumTarihi"];

/// Document id prefix used by protocol documents.
pub const PROTOCOL_ID_PREFIX: &str = "protocol_";

/// A clinical note from `health_records`.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthRecord {
    pub id: String,
    pub patient_id: Option<String>,
    pub personal_history: Option<String>,
    pub findings: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

impl HealthRecord {
    pub fn from_document(doc: &Document) -> Self {
        Self {
            id: doc.id.clone(),
            patient_id: text_field(&doc.data, "patientId"),
            personal_history: text_field(&doc.data, "personalHistory"),
            findings: text_field(&doc.data, "findings"),
            date: first_timestamp(&doc.data, RECORD_DATE_FIELDS),
        }
    }
}

/// A billed or performed service from `services`.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceRecord {
    pub id: String,
    /// First non-empty of `serviceName`, `name`, `originalServiceName`
    pub service_name: Option<String>,
    /// Service group label (`Grup_Adi`), e.g. "Aşılama"
    pub group: Option<String>,
    /// Visit key (`Protokol_No` or `protocolNo`)
    pub protocol_no: Option<String>,
    pub patient_id: Option<String>,
    pub patient_name: Option<String>,
    pub provider: Option<String>,
    pub date: Option<DateTime<Utc>>,
}

impl ServiceRecord {
    pub fn from_document(doc: &Document) -> Self {
        let data = &doc.data;
        Self {
            id: doc.id.clone(),
            service_name: first_text(data, &["serviceName", "name", "originalServiceName"]),
            group: text_field(data, "Grup_Adi"),
            protocol_no: first_text(data, &["Protokol_No", "protocolNo"]),
            patient_id: text_field(data, "patientId"),
            patient_name: text_field(data, "patientName"),
            provider: first_text(data, &["doctorName", "doctor", "provider"]),
            date: first_timestamp(data, RECORD_DATE_FIELDS),
        }
    }
}

/// A visit document from `protocols`, keyed `protocol_<number>`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtocolRecord {
    /// Bare protocol number
    pub protocol_no: String,
    pub patient_id: Option<String>,
    pub patient_name: Option<String>,
}

impl ProtocolRecord {
    pub fn from_document(doc: &Document) -> Self {
        let data = &doc.data;
        let protocol_no = match doc.id.strip_prefix(PROTOCOL_ID_PREFIX) {
            Some(number) => number.trim().to_string(),
            None => first_text(data, &["protocolNo", "Protokol_No"])
                .unwrap_or_else(|| doc.id.trim().to_string()),
        };

        let nested = data.get("patient");
        let patient_id = text_field(data, "patientId").or_else(|| {
            nested.and_then(|p| first_text(p, &["id", "patientId"]))
        });
        let patient_name = text_field(data, "patientName").or_else(|| {
            nested.and_then(|p| first_text(p, &["name", "fullName", "patientName"]))
        });

        Self {
            protocol_no,
            patient_id,
            patient_name,
        }
    }
}

/// A patient from `patients`.
#[derive(Debug, Clone, PartialEq)]
pub struct PatientRecord {
    pub id: String,
    pub name: Option<String>,
    pub birth_date: Option<DateTime<Utc>>,
}

impl PatientRecord {
    pub fn from_document(doc: &Document) -> Self {
        let data = &doc.data;
        let name = first_text(data, &["name", "fullName"]).or_else(|| {
            let parts: Vec<String> = ["firstName", "lastName"]
                .iter()
                .filter_map(|f| text_field(data, f))
                .collect();
            (!parts.is_empty()).then(|| parts.join(" "))
        });

        Self {
            id: doc.id.clone(),
            name,
            birth_date: first_timestamp(data, BIRTH_DATE_FIELDS),
        }
    }
}

/// Non-empty trimmed text at `field`. Numbers are rendered as text.
pub fn text_field(data: &Value, field: &str) -> Option<String> {
    match data.get(field)? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// First field in `fields` holding non-empty text.
pub fn first_text(data: &Value, fields: &[&str]) -> Option<String> {
    fields.iter().find_map(|f| text_field(data, f))
}

/// First field in `fields` holding a parseable timestamp.
pub fn first_timestamp(data: &Value, fields: &[&str]) -> Option<DateTime<Utc>> {
    fields
        .iter()
        .filter_map(|f| data.get(*f))
        .find_map(parse_flexible_timestamp)
}
