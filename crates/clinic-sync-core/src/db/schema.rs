//! SQLite schema definition.

/// Document store schema.
///
/// Every collection lives in the same table; documents are JSON bodies keyed by
/// `(collection, id)`.
pub const SCHEMA: &str = r#"
-- ============================================================================
-- Documents
-- ============================================================================

CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    data TEXT NOT NULL CHECK (json_valid(data)),  -- JSON object
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (collection, id)
);

CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection);

-- Dedup lookups on derived collections filter by provenance tag
CREATE INDEX IF NOT EXISTS idx_documents_source
    ON documents(collection, json_extract(data, '$.source'));
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_schema_valid() {
        let conn = Connection::open_in_memory().unwrap();
        let result = conn.execute_batch(SCHEMA);
        assert!(result.is_ok(), "Schema should be valid SQL: {:?}", result);
    }

    #[test]
    fn test_rejects_invalid_json() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        let result = conn.execute(
            "INSERT INTO documents (collection, id, data) VALUES ('c', 'a', 'not json')",
            [],
        );
        assert!(result.is_err());

        let result = conn.execute(
            "INSERT INTO documents (collection, id, data) VALUES ('c', 'a', '{\"x\":1}')",
            [],
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_primary_key_scoped_by_collection() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA).unwrap();

        conn.execute(
            "INSERT INTO documents (collection, id, data) VALUES ('a', 'same', '{}')",
            [],
        )
        .unwrap();
        let result = conn.execute(
            "INSERT INTO documents (collection, id, data) VALUES ('b', 'same', '{}')",
            [],
        );
        assert!(result.is_ok());

        let result = conn.execute(
            "INSERT INTO documents (collection, id, data) VALUES ('a', 'same', '{}')",
            [],
        );
        assert!(result.is_err());
    }
}
