//! Database migration system.
//!
//! Schema version stored in `PRAGMA user_version`. Only the initial schema
//! exists; any other stored version is rejected.

use rusqlite::Connection;

use crate::{schema, Result, StoreError, SCHEMA_VERSION};

/// Create the schema on a fresh database, or check that an existing one is at
/// the supported version.
pub fn run(conn: &Connection) -> Result<()> {
    let current_version: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    match current_version {
        0 => {
            tracing::info!("Initializing ledger schema v{SCHEMA_VERSION}");
            conn.execute_batch(schema::SCHEMA_V1)?;
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        }
        SCHEMA_VERSION => {}
        other => {
            return Err(StoreError::Migration(format!(
                "Database version {other} is not supported (expected {SCHEMA_VERSION})"
            )));
        }
    }

    Ok(())
}
