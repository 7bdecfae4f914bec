//! Catalog schema DDL and versioning.

use anyhow::{bail, Context};
use rusqlite::Connection;
use tracing::debug;

use crate::db::DbResult;

pub const CATALOG_SCHEMA_SQL: &str = include_str!("../schema/catalog_schema.sql");

/// Ordered schema steps. Step `n` upgrades a catalog from version `n - 1` to `n`.
const MIGRATIONS: &[(i64, &str)] = &[(1, CATALOG_SCHEMA_SQL)];

/// Highest `PRAGMA user_version` this build understands.
pub const TARGET_SCHEMA_VERSION: i64 = MIGRATIONS[MIGRATIONS.len() - 1].0;

/// Turns on WAL and foreign keys, then brings the schema up to
/// [`TARGET_SCHEMA_VERSION`]. Catalogs written by a newer build are refused.
pub fn initialize_schema(conn: &Connection) -> DbResult<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", true)?;

    let current: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if current > TARGET_SCHEMA_VERSION {
        bail!("catalog schema version {current} is newer than supported {TARGET_SCHEMA_VERSION}");
    }

    for (version, sql) in MIGRATIONS.iter().filter(|(version, _)| *version > current) {
        debug!(version, "applying catalog migration");
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(sql)
            .with_context(|| format!("catalog migration {version} failed"))?;
        tx.pragma_update(None, "user_version", version)?;
        tx.commit()?;
    }

    conn.execute(
        "INSERT INTO catalog_metadata (id, schema_version, created_at, updated_at)
         VALUES (1, ?1, strftime('%Y-%m-%dT%H:%M:%fZ','now'), strftime('%Y-%m-%dT%H:%M:%fZ','now'))
         ON CONFLICT(id) DO UPDATE SET schema_version = excluded.schema_version
         WHERE schema_version <> excluded.schema_version",
        [TARGET_SCHEMA_VERSION],
    )
    .context("failed to record catalog schema version")?;
    Ok(())
}
