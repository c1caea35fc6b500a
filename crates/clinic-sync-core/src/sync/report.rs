//! Aggregate statistics over a derived collection, computed after the final
//! batch has committed.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::db::{Database, DbResult, Document};

/// Share of `part` in `total`, as a percentage. Zero for an empty collection.
pub fn ratio(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}

fn bump(map: &mut BTreeMap<String, usize>, key: Option<&str>) {
    let key = key.filter(|k| !k.is_empty()).unwrap_or("(yok)");
    *map.entry(key.to_string()).or_insert(0) += 1;
}

fn has_value(doc: &Document, field: &str) -> bool {
    !matches!(doc.data.get(field), None | Some(Value::Null))
}

fn write_counts(
    f: &mut fmt::Formatter<'_>,
    title: &str,
    counts: &BTreeMap<String, usize>,
) -> fmt::Result {
    writeln!(f, "{}:", title)?;
    for (key, count) in counts {
        writeln!(f, "  {:<28}{}", key, count)?;
    }
    Ok(())
}

fn write_ratio(f: &mut fmt::Formatter<'_>, label: &str, part: usize, total: usize) -> fmt::Result {
    writeln!(
        f,
        "  {:<28}{} (%{:.1})",
        label,
        part,
        ratio(part, total)
    )
}

/// Statistics over `growthMeasurements`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementReport {
    pub collection: String,
    pub total: usize,
    pub by_source: BTreeMap<String, usize>,
    pub by_type: BTreeMap<String, usize>,
    pub with_weight: usize,
    pub with_height: usize,
    pub with_head_circumference: usize,
}

impl MeasurementReport {
    pub fn collect(db: &Database, collection: &str) -> DbResult<Self> {
        let docs = db.list_documents(collection)?;
        Ok(Self::from_documents(collection, &docs))
    }

    pub fn from_documents(collection: &str, docs: &[Document]) -> Self {
        let mut report = Self {
            collection: collection.to_string(),
            total: docs.len(),
            ..Self::default()
        };
        for doc in docs {
            bump(&mut report.by_source, doc.data["source"].as_str());
            bump(&mut report.by_type, doc.data["measurementType"].as_str());
            report.with_weight += has_value(doc, "weight") as usize;
            report.with_height += has_value(doc, "height") as usize;
            report.with_head_circumference += has_value(doc, "headCircumference") as usize;
        }
        report
    }
}

impl fmt::Display for MeasurementReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== {} raporu ===", self.collection)?;
        writeln!(f, "Toplam ölçüm: {}", self.total)?;
        write_counts(f, "Kaynağa göre", &self.by_source)?;
        write_counts(f, "Ölçüm tipine göre", &self.by_type)?;
        writeln!(f, "Alan doluluğu:")?;
        write_ratio(f, "Kilo", self.with_weight, self.total)?;
        write_ratio(f, "Boy", self.with_height, self.total)?;
        write_ratio(f, "Baş çevresi", self.with_head_circumference, self.total)
    }
}

/// Statistics over a vaccination collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VaccinationReport {
    pub collection: String,
    pub total: usize,
    pub by_source: BTreeMap<String, usize>,
    pub by_type: BTreeMap<String, usize>,
    pub by_match_method: BTreeMap<String, usize>,
    pub with_dose: usize,
    pub with_protocol: usize,
    pub with_patient_name: usize,
}

impl VaccinationReport {
    pub fn collect(db: &Database, collection: &str) -> DbResult<Self> {
        let docs = db.list_documents(collection)?;
        Ok(Self::from_documents(collection, &docs))
    }

    pub fn from_documents(collection: &str, docs: &[Document]) -> Self {
        let mut report = Self {
            collection: collection.to_string(),
            total: docs.len(),
            ..Self::default()
        };
        for doc in docs {
            let metadata = &doc.data["metadata"];
            bump(&mut report.by_source, metadata["source"].as_str());
            bump(&mut report.by_type, doc.data["vaccineType"].as_str());
            bump(&mut report.by_match_method, metadata["matchMethod"].as_str());
            report.with_dose += has_value(doc, "dose") as usize;
            report.with_protocol += has_value(doc, "protocolNo") as usize;
            report.with_patient_name += doc.data["patientName"]
                .as_str()
                .is_some_and(|n| !n.is_empty()) as usize;
        }
        report
    }
}

impl fmt::Display for VaccinationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== {} raporu ===", self.collection)?;
        writeln!(f, "Toplam aşı kaydı: {}", self.total)?;
        write_counts(f, "Kaynağa göre", &self.by_source)?;
        write_counts(f, "Aşı tipine göre", &self.by_type)?;
        write_counts(f, "Eşleşme yöntemine göre", &self.by_match_method)?;
        writeln!(f, "Alan doluluğu:")?;
        write_ratio(f, "Doz", self.with_dose, self.total)?;
        write_ratio(f, "Protokol no", self.with_protocol, self.total)?;
        write_ratio(f, "Hasta adı", self.with_patient_name, self.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_measurement_report() {
        let docs = vec![
            Document::new(
                "a",
                json!({
                    "source": "health_records",
                    "measurementType": "birth",
                    "weight": 3.5,
                    "height": 50.0
                }),
            ),
            Document::new(
                "b",
                json!({"source": "health_records", "measurementType": "visit", "weight": 9.1}),
            ),
            Document::new("c", json!({"source": "manual", "headCircumference": 44.0})),
        ];
        let report = MeasurementReport::from_documents("growthMeasurements", &docs);

        assert_eq!(report.total, 3);
        assert_eq!(report.by_source["health_records"], 2);
        assert_eq!(report.by_source["manual"], 1);
        assert_eq!(report.by_type["birth"], 1);
        assert_eq!(report.by_type["(yok)"], 1);
        assert_eq!(report.with_weight, 2);
        assert_eq!(report.with_height, 1);
        assert_eq!(report.with_head_circumference, 1);
        assert!(report.to_string().contains("Kilo"));
    }

    #[test]
    fn test_vaccination_report() {
        let docs = vec![
            Document::new(
                "a",
                json!({
                    "vaccineType": "rotavirus",
                    "dose": 1,
                    "protocolNo": null,
                    "patientName": "Ada",
                    "metadata": {"source": "services", "matchMethod": "keyword"}
                }),
            ),
            Document::new(
                "b",
                json!({
                    "vaccineType": "unknown",
                    "dose": null,
                    "protocolNo": "1042",
                    "patientName": "",
                    "metadata": {"source": "services", "matchMethod": "group"}
                }),
            ),
        ];
        let report = VaccinationReport::from_documents("vaccinations", &docs);

        assert_eq!(report.by_source["services"], 2);
        assert_eq!(report.by_match_method["group"], 1);
        assert_eq!(report.with_dose, 1);
        assert_eq!(report.with_protocol, 1);
        assert_eq!(report.with_patient_name, 1);
    }

    #[test]
    fn test_ratio_of_empty_collection() {
        assert_eq!(ratio(0, 0), 0.0);
        assert_eq!(ratio(1, 4), 25.0);
    }
}
