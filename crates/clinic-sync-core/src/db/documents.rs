//! Document database operations.

use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Database, DbError, DbResult, WriteBatch, WriteOp, MAX_BATCH_WRITES};

/// A stored document: an id plus its JSON object body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

impl Document {
    pub fn new(id: impl Into<String>, data: Value) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }
}

impl Database {
    /// Insert or replace a single document outside of any batch.
    pub fn set_document(&self, collection: &str, id: &str, data: &Value) -> DbResult<()> {
        ensure_object(collection, id, data)?;
        upsert(&self.conn, collection, id, data)?;
        Ok(())
    }

    /// Get a document by id.
    pub fn get_document(&self, collection: &str, id: &str) -> DbResult<Option<Document>> {
        let row: Option<String> = self
            .conn
            .query_row(
                "SELECT data FROM documents WHERE collection = ?1 AND id = ?2",
                params![collection, id],
                |row| row.get(0),
            )
            .optional()?;

        row.map(|data| {
            Ok(Document {
                id: id.to_string(),
                data: serde_json::from_str(&data)?,
            })
        })
        .transpose()
    }

    /// Fetch a whole collection, ordered by document id.
    pub fn list_documents(&self, collection: &str) -> DbResult<Vec<Document>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, data FROM documents WHERE collection = ?1 ORDER BY id")?;
        let rows = stmt.query_map([collection], |row| {
            Ok(DocumentRow {
                id: row.get(0)?,
                data: row.get(1)?,
            })
        })?;

        let mut docs = Vec::new();
        for row in rows {
            docs.push(row?.try_into()?);
        }
        Ok(docs)
    }

    /// Documents whose top-level string field equals `value`.
    pub fn find_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> DbResult<Vec<Document>> {
        let path = format!("$.{}", field);
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, data FROM documents
            WHERE collection = ?1 AND json_extract(data, ?2) = ?3
            ORDER BY id
            "#,
        )?;
        let rows = stmt.query_map(params![collection, path, value], |row| {
            Ok(DocumentRow {
                id: row.get(0)?,
                data: row.get(1)?,
            })
        })?;

        let mut docs = Vec::new();
        for row in rows {
            docs.push(row?.try_into()?);
        }
        Ok(docs)
    }

    /// Number of documents in a collection.
    pub fn count_documents(&self, collection: &str) -> DbResult<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?1",
            [collection],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Distinct collection names present in the store.
    pub fn list_collections(&self) -> DbResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT collection FROM documents ORDER BY collection")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    /// Apply a batch atomically. All operations commit or none do.
    pub fn commit_batch(&self, batch: &WriteBatch) -> DbResult<()> {
        if batch.len() > MAX_BATCH_WRITES {
            return Err(DbError::BatchTooLarge {
                len: batch.len(),
                max: MAX_BATCH_WRITES,
            });
        }

        let tx = self.conn.unchecked_transaction()?;
        for op in batch.ops() {
            match op {
                WriteOp::Set {
                    collection,
                    id,
                    data,
                } => {
                    ensure_object(collection, id, data)?;
                    upsert(&tx, collection, id, data)?;
                }
                WriteOp::Delete { collection, id } => {
                    tx.execute(
                        "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
                        params![collection, id],
                    )?;
                }
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Replace the content of `target` with the content of `shadow` in one
    /// transaction, leaving `shadow` empty. Returns how many documents `target`
    /// held before the swap.
    pub fn promote_collection(&self, shadow: &str, target: &str) -> DbResult<usize> {
        if shadow == target {
            return Err(DbError::Constraint(format!(
                "cannot promote collection {} onto itself",
                target
            )));
        }

        let tx = self.conn.unchecked_transaction()?;
        let replaced = tx.execute("DELETE FROM documents WHERE collection = ?1", [target])?;
        tx.execute(
            r#"
            UPDATE documents
            SET collection = ?2, updated_at = datetime('now')
            WHERE collection = ?1
            "#,
            params![shadow, target],
        )?;
        tx.commit()?;
        Ok(replaced)
    }
}

fn ensure_object(collection: &str, id: &str, data: &Value) -> DbResult<()> {
    if data.is_object() {
        Ok(())
    } else {
        Err(DbError::NotAnObject {
            collection: collection.to_string(),
            id: id.to_string(),
        })
    }
}

fn upsert(conn: &rusqlite::Connection, collection: &str, id: &str, data: &Value) -> DbResult<()> {
    let body = serde_json::to_string(data)?;
    conn.execute(
        r#"
        INSERT INTO documents (collection, id, data, updated_at)
        VALUES (?1, ?2, ?3, datetime('now'))
        ON CONFLICT(collection, id) DO UPDATE SET
            data = excluded.data,
            updated_at = datetime('now')
        "#,
        params![collection, id, body],
    )?;
    Ok(())
}

/// Intermediate row struct for database mapping.
struct DocumentRow {
    id: String,
    data: String,
}

impl TryFrom<DocumentRow> for Document {
    type Error = DbError;

    fn try_from(row: DocumentRow) -> Result<Self, Self::Error> {
        Ok(Document {
            id: row.id,
            data: serde_json::from_str(&row.data)?,
        })
    }
}
