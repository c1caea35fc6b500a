//! Protocol-to-patient identity linking.
//!
//! Services do not always carry a patient id. When they don't, the visit's
//! protocol number is joined against the `protocols` collection:
//!
//! ```text
//! service.patientId ──present──▶ Direct
//!        │ absent
//!        ▼
//! Protokol_No ──in index──▶ ViaProtocol
//!        │ missing
//!        ▼
//!    Unresolved (counted, not written)
//! ```

mod directory;

pub use directory::*;

use std::collections::HashMap;

use tracing::debug;

use crate::db::{Database, DbResult, Document};
use crate::models::{ProtocolRecord, ServiceRecord};

/// Patient identity resolved for a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientRef {
    pub patient_id: String,
    pub patient_name: Option<String>,
}

/// Result of linking a service to a patient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    /// The service carried its own patient id
    Direct(PatientRef),
    /// The patient was found through the service's protocol number
    ViaProtocol(PatientRef),
    /// Neither route produced a patient
    Unresolved { protocol_no: Option<String> },
}

impl LinkOutcome {
    pub fn patient(&self) -> Option<&PatientRef> {
        match self {
            LinkOutcome::Direct(p) | LinkOutcome::ViaProtocol(p) => Some(p),
            LinkOutcome::Unresolved { .. } => None,
        }
    }
}

/// Protocol number → patient map.
#[derive(Debug, Clone, Default)]
pub struct ProtocolIndex {
    entries: HashMap<String, PatientRef>,
    /// Protocol documents that named no patient
    skipped: usize,
}

impl ProtocolIndex {
    /// Build the index from protocol documents. When two documents share a
    /// protocol number the first one (in iteration order) wins.
    pub fn build(docs: &[Document]) -> Self {
        let mut index = Self::default();
        for doc in docs {
            let protocol = ProtocolRecord::from_document(doc);
            let Some(patient_id) = protocol.patient_id else {
                index.skipped += 1;
                continue;
            };
            if index.entries.contains_key(&protocol.protocol_no) {
                debug!(
                    protocol = %protocol.protocol_no,
                    doc = %doc.id,
                    "duplicate protocol ignored"
                );
                continue;
            }
            index.entries.insert(
                protocol.protocol_no,
                PatientRef {
                    patient_id,
                    patient_name: protocol.patient_name,
                },
            );
        }
        index
    }

    /// Fetch and index a whole protocol collection.
    pub fn load(db: &Database, collection: &str) -> DbResult<Self> {
        let docs = db.list_documents(collection)?;
        Ok(Self::build(&docs))
    }

    /// Exact-string lookup of a protocol number.
    pub fn get(&self, protocol_no: &str) -> Option<&PatientRef> {
        self.entries.get(protocol_no.trim())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

/// Links services to patients, optionally through a protocol index.
#[derive(Debug, Clone, Default)]
pub struct PatientLinker {
    protocols: Option<ProtocolIndex>,
}

impl PatientLinker {
    /// Only trust the patient id carried by the service itself.
    pub fn direct_only() -> Self {
        Self { protocols: None }
    }

    /// Fall back to the protocol join when the service has no patient id.
    pub fn with_protocols(index: ProtocolIndex) -> Self {
        Self {
            protocols: Some(index),
        }
    }

    pub fn protocols(&self) -> Option<&ProtocolIndex> {
        self.protocols.as_ref()
    }

    pub fn link(&self, service: &ServiceRecord) -> LinkOutcome {
        if let Some(patient_id) = &service.patient_id {
            return LinkOutcome::Direct(PatientRef {
                patient_id: patient_id.clone(),
                patient_name: service.patient_name.clone(),
            });
        }

        let found = match (&self.protocols, &service.protocol_no) {
            (Some(index), Some(protocol_no)) => index.get(protocol_no),
            _ => None,
        };

        match found {
            Some(patient) => LinkOutcome::ViaProtocol(PatientRef {
                patient_id: patient.patient_id.clone(),
                patient_name: service
                    .patient_name
                    .clone()
                    .or_else(|| patient.patient_name.clone()),
            }),
            None => LinkOutcome::Unresolved {
                protocol_no: service.protocol_no.clone(),
            },
        }
    }
}
