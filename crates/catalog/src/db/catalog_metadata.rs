use crate::db::{parse_datetime, parse_datetime_opt, query_optional, to_rfc3339, DbHandle, DbResult};
use anyhow::Context;
use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::{Deserialize, Serialize};

/// The single bookkeeping row of a catalog file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogMetadata {
    pub schema_version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_opened: Option<DateTime<Utc>>,
}

impl CatalogMetadata {
    pub fn load_singleton<H: DbHandle>(db: &H) -> DbResult<Self> {
        query_optional(
            db,
            "SELECT schema_version, created_at, updated_at, last_opened
             FROM catalog_metadata WHERE id = 1",
            [],
            CatalogMetadata::from_row,
        )?
        .context("catalog_metadata singleton row is missing")
    }

    pub fn update_last_opened<H: DbHandle>(db: &H) -> DbResult<()> {
        db.execute(
            "UPDATE catalog_metadata SET last_opened = ?1 WHERE id = 1",
            params![to_rfc3339(Utc::now())],
        )
        .context("failed to update catalog_metadata.last_opened")?;
        Ok(())
    }

    fn from_row(row: &rusqlite::Row<'_>) -> DbResult<Self> {
        Ok(Self {
            schema_version: row.get(0)?,
            created_at: parse_datetime(row.get::<_, String>(1)?, "created_at")?,
            updated_at: parse_datetime(row.get::<_, String>(2)?, "updated_at")?,
            last_opened: parse_datetime_opt(row.get::<_, Option<String>>(3)?, "last_opened")?,
        })
    }
}
