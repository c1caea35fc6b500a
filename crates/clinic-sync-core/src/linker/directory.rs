//! Lazily cached patient lookups.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::db::{Database, DbResult};
use crate::models::PatientRecord;

/// Per-run cache over the `patients` collection.
///
/// Each patient id is fetched at most once per run; misses are cached too.
pub struct PatientDirectory<'a> {
    db: &'a Database,
    collection: String,
    cache: HashMap<String, Option<PatientRecord>>,
    fetches: usize,
}

impl<'a> PatientDirectory<'a> {
    pub fn new(db: &'a Database, collection: impl Into<String>) -> Self {
        Self {
            db,
            collection: collection.into(),
            cache: HashMap::new(),
            fetches: 0,
        }
    }

    pub fn get(&mut self, patient_id: &str) -> DbResult<Option<&PatientRecord>> {
        if !self.cache.contains_key(patient_id) {
            let record = self
                .db
                .get_document(&self.collection, patient_id)?
                .map(|doc| PatientRecord::from_document(&doc));
            self.fetches += 1;
            self.cache.insert(patient_id.to_string(), record);
        }
        Ok(self.cache.get(patient_id).and_then(Option::as_ref))
    }

    pub fn birth_date(&mut self, patient_id: &str) -> DbResult<Option<DateTime<Utc>>> {
        Ok(self.get(patient_id)?.and_then(|p| p.birth_date))
    }

    pub fn name(&mut self, patient_id: &str) -> DbResult<Option<String>> {
        Ok(self.get(patient_id)?.and_then(|p| p.name.clone()))
    }

    /// Number of store round-trips made so far.
    pub fn fetches(&self) -> usize {
        self.fetches
    }
}
