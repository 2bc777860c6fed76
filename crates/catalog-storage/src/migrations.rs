//! Database schema migrations.

use rusqlite::Connection;
use tracing::info;

use catalog_core::error::CatalogError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), CatalogError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| CatalogError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| CatalogError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: records");
    }

    Ok(())
}

/// Version 1: the records table.
///
/// `seq` is the insertion order used to break score ties. An upsert on an
/// existing id updates the row in place, so `seq` never changes.
fn apply_v1(conn: &Connection) -> Result<(), CatalogError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS records (
            seq          INTEGER PRIMARY KEY AUTOINCREMENT,
            id           TEXT NOT NULL UNIQUE,
            payload      TEXT NOT NULL DEFAULT '{}',
            vector       BLOB NOT NULL,
            dimension    INTEGER NOT NULL,
            ingested_at  INTEGER NOT NULL
        );

        INSERT INTO schema_migrations (version, name) VALUES (1, 'records');
        ",
    )
    .map_err(|e| CatalogError::Storage(format!("Migration v1 failed: {}", e)))?;
    Ok(())
}
