//! Schema setup for the libSQL key-value store.
//!
//! The schema version lives in SQLite's `user_version` pragma. Bump
//! `SCHEMA_VERSION` and extend `run_migrations` when the table changes.

use libsql::Connection;
use tracing::info;

use crate::error::StorageError;

const SCHEMA_VERSION: i64 = 1;

const KV_STORE: &str = "
    CREATE TABLE IF NOT EXISTS kv_store (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at TEXT NOT NULL DEFAULT (datetime('now'))
    );
";

/// Bring the schema up to `SCHEMA_VERSION`.
pub async fn run_migrations(conn: &Connection) -> Result<(), StorageError> {
    let version = schema_version(conn).await?;
    if version >= SCHEMA_VERSION {
        return Ok(());
    }

    info!(from = version, to = SCHEMA_VERSION, "Migrating key-value schema");
    conn.execute_batch(&format!("{KV_STORE} PRAGMA user_version = {SCHEMA_VERSION};"))
        .await
        .map_err(|e| StorageError::Migration(format!("kv_store V{SCHEMA_VERSION}: {e}")))?;
    Ok(())
}

async fn schema_version(conn: &Connection) -> Result<i64, StorageError> {
    let mut rows = conn
        .query("PRAGMA user_version", ())
        .await
        .map_err(|e| StorageError::Migration(format!("user_version: {e}")))?;
    match rows.next().await {
        Ok(Some(row)) => row
            .get::<i64>(0)
            .map_err(|e| StorageError::Migration(format!("user_version: {e}"))),
        Ok(None) => Ok(0),
        Err(e) => Err(StorageError::Migration(format!("user_version: {e}"))),
    }
}
