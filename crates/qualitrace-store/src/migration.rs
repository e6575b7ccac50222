//! Database schema migrations for SQLite.
//!
//! We use a simple versioned migration system. Each migration is a SQL string
//! that transforms the schema from version N to N+1.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema version {} is newer than supported version {}",
            current, CURRENT_VERSION
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, crate::sqlite::now_millis()],
            )?;
        }

        tx.commit()?;
        tracing::info!(version = CURRENT_VERSION, "applied schema migrations");
    }

    Ok(())
}

/// Apply a specific migration version.
fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Blocks table: one row per chain position
        CREATE TABLE blocks (
            subject_id TEXT NOT NULL,         -- opaque product identifier
            seq INTEGER NOT NULL,             -- position within the subject's chain
            timestamp INTEGER NOT NULL,       -- sealing time (Unix ms)
            kind TEXT NOT NULL,               -- record kind name
            record BLOB NOT NULL,             -- canonical CBOR encoding of the record
            previous_hash BLOB NOT NULL,      -- 32 bytes, zero for seq=0
            hash BLOB NOT NULL,               -- 32 bytes, SHA-256 of the block preimage
            stored_at INTEGER NOT NULL,       -- local timestamp of insertion

            PRIMARY KEY (subject_id, seq)
        );

        -- Indexes for common queries
        CREATE INDEX idx_blocks_kind ON blocks(kind);
        CREATE INDEX idx_blocks_hash ON blocks(hash);
        CREATE INDEX idx_blocks_timestamp ON blocks(timestamp);
        "#,
    )?;

    Ok(())
}
