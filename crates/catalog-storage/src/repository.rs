//! Record repository backed by the `records` table.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use rusqlite::OptionalExtension;

use catalog_core::error::CatalogError;
use catalog_core::types::{Payload, Record};

use crate::db::Database;

/// Repository for indexed records.
#[derive(Debug, Clone)]
pub struct RecordRepository {
    db: Arc<Database>,
}

impl RecordRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a record, or replace payload and vector of an existing id.
    ///
    /// The row keeps its original `seq` and `ingested_at` on conflict.
    pub fn upsert(&self, record: &Record) -> Result<(), CatalogError> {
        let payload = serde_json::to_string(&record.payload)?;
        let blob = encode_vector(&record.vector);
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO records (id, payload, vector, dimension, ingested_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                    payload = excluded.payload,
                    vector = excluded.vector,
                    dimension = excluded.dimension",
                rusqlite::params![
                    record.id,
                    payload,
                    blob,
                    record.vector.len() as i64,
                    record.ingested_at.timestamp_millis(),
                ],
            )
            .map_err(|e| CatalogError::Storage(format!("Failed to save record: {}", e)))?;
            Ok(())
        })
    }

    /// Insert a record unless its id is already stored. Returns `true` when
    /// a row was written.
    pub fn insert_if_absent(&self, record: &Record) -> Result<bool, CatalogError> {
        let payload = serde_json::to_string(&record.payload)?;
        let blob = encode_vector(&record.vector);
        self.db.with_conn(|conn| {
            let changed = conn
                .execute(
                    "INSERT INTO records (id, payload, vector, dimension, ingested_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(id) DO NOTHING",
                    rusqlite::params![
                        record.id,
                        payload,
                        blob,
                        record.vector.len() as i64,
                        record.ingested_at.timestamp_millis(),
                    ],
                )
                .map_err(|e| CatalogError::Storage(format!("Failed to save record: {}", e)))?;
            Ok(changed > 0)
        })
    }

    /// Find a record by id.
    pub fn find_by_id(&self, id: &str) -> Result<Option<Record>, CatalogError> {
        self.db.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, payload, vector, ingested_at FROM records WHERE id = ?1",
                    rusqlite::params![id],
                    |row| Ok(RawRow::from_row(row)),
                )
                .optional()
                .map_err(|e| CatalogError::Storage(e.to_string()))?;

            match row {
                Some(raw) => Ok(Some(raw?.into_record()?)),
                None => Ok(None),
            }
        })
    }

    pub fn exists(&self, id: &str) -> Result<bool, CatalogError> {
        self.db.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM records WHERE id = ?1",
                    rusqlite::params![id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| CatalogError::Storage(e.to_string()))?;
            Ok(found.is_some())
        })
    }

    /// Load every record in insertion order.
    pub fn load_all(&self) -> Result<Vec<Record>, CatalogError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT id, payload, vector, ingested_at FROM records ORDER BY seq ASC")
                .map_err(|e| CatalogError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map([], |row| Ok(RawRow::from_row(row)))
                .map_err(|e| CatalogError::Storage(e.to_string()))?;

            let mut records = Vec::new();
            for row in rows {
                let raw = row.map_err(|e| CatalogError::Storage(e.to_string()))??;
                records.push(raw.into_record()?);
            }
            Ok(records)
        })
    }

    pub fn count(&self) -> Result<u64, CatalogError> {
        self.db.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))
                .map_err(|e| CatalogError::Storage(e.to_string()))?;
            Ok(count as u64)
        })
    }
}

/// Columns as read from SQLite, before payload and vector decoding.
struct RawRow {
    id: String,
    payload: String,
    vector: Vec<u8>,
    ingested_at: i64,
}

impl RawRow {
    fn from_row(row: &rusqlite::Row<'_>) -> Result<Self, CatalogError> {
        let read = |e: rusqlite::Error| CatalogError::Storage(e.to_string());
        Ok(Self {
            id: row.get(0).map_err(read)?,
            payload: row.get(1).map_err(read)?,
            vector: row.get(2).map_err(read)?,
            ingested_at: row.get(3).map_err(read)?,
        })
    }

    fn into_record(self) -> Result<Record, CatalogError> {
        let payload: Payload = serde_json::from_str(&self.payload)?;
        let vector = decode_vector(&self.vector)?;
        let ingested_at = Utc
            .timestamp_millis_opt(self.ingested_at)
            .single()
            .unwrap_or_else(Utc::now);
        Ok(Record {
            id: self.id,
            payload,
            vector,
            ingested_at,
        })
    }
}

/// Encode a vector as little-endian f32 bytes.
fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_vector(bytes: &[u8]) -> Result<Vec<f32>, CatalogError> {
    if bytes.len() % 4 != 0 {
        return Err(CatalogError::Storage(format!(
            "Corrupt vector blob: {} bytes is not a multiple of 4",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_repo() -> RecordRepository {
        RecordRepository::new(Arc::new(Database::in_memory().unwrap()))
    }

    fn make_record(id: &str, vector: Vec<f32>, name: &str) -> Record {
        let mut payload = Payload::new();
        payload.insert("productName".to_string(), name.to_string());
        Record {
            id: id.to_string(),
            payload,
            vector,
            ingested_at: Utc::now(),
        }
    }

    #[test]
    fn test_upsert_and_find() {
        let repo = make_repo();
        let record = make_record("P1", vec![0.5, -1.25, 3.0], "Mouse");
        repo.upsert(&record).unwrap();

        let found = repo.find_by_id("P1").unwrap().unwrap();
        assert_eq!(found.vector, vec![0.5, -1.25, 3.0]);
        assert_eq!(found.payload["productName"], "Mouse");
        assert_eq!(
            found.ingested_at.timestamp_millis(),
            record.ingested_at.timestamp_millis()
        );
    }

    #[test]
    fn test_find_missing_returns_none() {
        let repo = make_repo();
        assert!(repo.find_by_id("nope").unwrap().is_none());
        assert!(!repo.exists("nope").unwrap());
    }

    #[test]
    fn test_upsert_replaces_and_keeps_order() {
        let repo = make_repo();
        repo.upsert(&make_record("A", vec![1.0], "first")).unwrap();
        repo.upsert(&make_record("B", vec![2.0], "second")).unwrap();
        repo.upsert(&make_record("A", vec![9.0], "replaced")).unwrap();

        assert_eq!(repo.count().unwrap(), 2);
        let all = repo.load_all().unwrap();
        let ids: Vec<&str> = all.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B"]);
        assert_eq!(all[0].vector, vec![9.0]);
        assert_eq!(all[0].payload["productName"], "replaced");
    }

    #[test]
    fn test_insert_if_absent_keeps_first() {
        let repo = make_repo();
        assert!(repo.insert_if_absent(&make_record("P1", vec![1.0], "first")).unwrap());
        assert!(!repo.insert_if_absent(&make_record("P1", vec![2.0], "second")).unwrap());

        let stored = repo.find_by_id("P1").unwrap().unwrap();
        assert_eq!(stored.vector, vec![1.0]);
        assert_eq!(stored.payload["productName"], "first");
    }

    #[test]
    fn test_records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.db");
        {
            let repo = RecordRepository::new(Arc::new(Database::new(&path).unwrap()));
            repo.upsert(&make_record("P7", vec![0.1, 0.2], "Stand")).unwrap();
        }
        let repo = RecordRepository::new(Arc::new(Database::new(&path).unwrap()));
        assert!(repo.exists("P7").unwrap());
        assert_eq!(repo.load_all().unwrap()[0].vector, vec![0.1, 0.2]);
    }

    #[test]
    fn test_decode_rejects_truncated_blob() {
        assert!(decode_vector(&[0, 0, 128]).is_err());
        assert_eq!(decode_vector(&encode_vector(&[2.5])).unwrap(), vec![2.5]);
    }
}
