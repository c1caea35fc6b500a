//! Bulk removal of derived documents by provenance tag.

use tracing::info;

use crate::db::{BatchWriter, Database, DbResult};

/// Delete every document in `collection` whose `source` equals `source_tag`,
/// in batches of at most `batch_size`. Returns the number deleted.
///
/// Used before a full recompute of measurements; documents with any other
/// source tag are left alone.
pub fn purge_by_source(
    db: &Database,
    collection: &str,
    source_tag: &str,
    batch_size: usize,
) -> DbResult<usize> {
    let docs = db.find_by_field(collection, "source", source_tag)?;
    let mut writer = BatchWriter::with_limit(db, batch_size);
    for doc in &docs {
        writer.delete(collection, &doc.id)?;
    }
    let stats = writer.finish()?;
    info!(
        collection,
        source = source_tag,
        deleted = docs.len(),
        commits = stats.commits,
        "purged derived documents"
    );
    Ok(docs.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_purge_only_matching_source() {
        let db = Database::open_in_memory().unwrap();
        for i in 0..7 {
            let data = json!({"source": "health_records"});
            db.set_document("growthMeasurements", &format!("h{}", i), &data)
                .unwrap();
        }
        db.set_document("growthMeasurements", "m1", &json!({"source": "manual"}))
            .unwrap();

        let deleted = purge_by_source(&db, "growthMeasurements", "health_records", 3).unwrap();

        assert_eq!(deleted, 7);
        assert_eq!(db.count_documents("growthMeasurements").unwrap(), 1);
        assert!(db.get_document("growthMeasurements", "m1").unwrap().is_some());
    }
}
