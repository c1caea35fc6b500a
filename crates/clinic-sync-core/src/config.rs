//! Job configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::MAX_BATCH_WRITES;
use crate::extract::MatchPolicy;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Collection names and constants shared by every job.
///
/// `Default` holds the values the clinic's store actually uses; a JSON file only
/// needs to name the fields it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncConfig {
    pub patients_collection: String,
    pub health_records_collection: String,
    pub services_collection: String,
    pub protocols_collection: String,
    pub measurements_collection: String,
    /// Target of the services-only vaccination job
    pub vaccinations_collection: String,
    /// Target of the protocol-linked vaccination job
    pub vaccination_records_collection: String,
    /// Appended to a target's name to form its staging collection
    pub shadow_suffix: String,
    pub batch_size: usize,
    pub match_policy: MatchPolicy,
    /// Provenance tag stamped on measurements and used for dedup
    pub measurement_source: String,
    pub default_provider: String,
    pub location: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            patients_collection: "patients".into(),
            health_records_collection: "health_records".into(),
            services_collection: "services".into(),
            protocols_collection: "protocols".into(),
            measurements_collection: "growthMeasurements".into(),
            vaccinations_collection: "vaccinations".into(),
            vaccination_records_collection: "vaccination_records".into(),
            shadow_suffix: "__rebuild".into(),
            batch_size: MAX_BATCH_WRITES,
            match_policy: MatchPolicy::Last,
            measurement_source: "health_records".into(),
            default_provider: "Klinik".into(),
            location: "Klinik".into(),
        }
    }
}

impl SyncConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: SyncConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_WRITES {
            return Err(ConfigError::Invalid(format!(
                "batchSize must be between 1 and {}",
                MAX_BATCH_WRITES
            )));
        }
        if self.shadow_suffix.is_empty() {
            return Err(ConfigError::Invalid("shadowSuffix must not be empty".into()));
        }
        if self.measurement_source.trim().is_empty() {
            return Err(ConfigError::Invalid("measurementSource must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.batch_size, 400);
        assert_eq!(config.match_policy, MatchPolicy::Last);
        assert_eq!(config.shadow_suffix, "__rebuild");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_override() {
        let config = SyncConfig::from_json(r#"{"batchSize": 50, "matchPolicy": "first"}"#).unwrap();
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.match_policy, MatchPolicy::First);
        assert_eq!(config.services_collection, "services");
    }

    #[test]
    fn test_rejects_oversized_batch() {
        assert!(matches!(
            SyncConfig::from_json(r#"{"batchSize": 500}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(SyncConfig::from_json(r#"{"batchSize": 0}"#).is_err());
    }
}
