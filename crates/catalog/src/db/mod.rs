//! Row types for the catalog tables, one module per table.

use anyhow::Context;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, Row, Transaction};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub mod captions;
pub mod catalog_metadata;
pub mod db;
pub mod face_regions;
pub mod image_tags;
pub mod images;
pub mod tags;
pub mod templates;

pub use captions::{CaptionKind, CaptionRow};
pub use catalog_metadata::CatalogMetadata;
pub use db::CatalogDb;
pub use face_regions::FaceRegionRow;
pub use image_tags::ImageTag;
pub use images::Image;
pub use tags::Tag;
pub use templates::TemplateRow;

pub type DbResult<T> = anyhow::Result<T>;

/// Anything that can hand out the catalog connection: a `Connection`, an open
/// `Transaction` or a [`CatalogDb`]. Row modules are generic over it.
pub trait DbHandle {
    fn connection(&self) -> &Connection;

    fn execute(&self, sql: &str, params: impl rusqlite::Params) -> rusqlite::Result<usize> {
        self.connection().execute(sql, params)
    }

    fn prepare(&self, sql: &str) -> rusqlite::Result<rusqlite::Statement<'_>> {
        self.connection().prepare(sql)
    }

    fn last_insert_rowid(&self) -> i64 {
        self.connection().last_insert_rowid()
    }
}

impl DbHandle for Connection {
    fn connection(&self) -> &Connection {
        self
    }
}

impl DbHandle for Transaction<'_> {
    fn connection(&self) -> &Connection {
        self
    }
}

/// Maps the first row, failing when the query returns nothing.
pub fn query_one<T, H, P, F>(db: &H, sql: &str, params: P, map: F) -> DbResult<T>
where
    H: DbHandle + ?Sized,
    P: rusqlite::Params,
    F: FnOnce(&Row) -> DbResult<T>,
{
    let mut stmt = db.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    let row = rows.next()?.context("query returned no rows")?;
    map(row)
}

pub fn query_optional<T, H, P, F>(db: &H, sql: &str, params: P, map: F) -> DbResult<Option<T>>
where
    H: DbHandle + ?Sized,
    P: rusqlite::Params,
    F: FnOnce(&Row) -> DbResult<T>,
{
    let mut stmt = db.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    match rows.next()? {
        Some(row) => Ok(Some(map(row)?)),
        None => Ok(None),
    }
}

pub fn query_all<T, H, P, F>(db: &H, sql: &str, params: P, mut map: F) -> DbResult<Vec<T>>
where
    H: DbHandle + ?Sized,
    P: rusqlite::Params,
    F: FnMut(&Row) -> DbResult<T>,
{
    let mut stmt = db.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(map(row)?);
    }
    Ok(out)
}

pub fn to_rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn to_rfc3339_opt(ts: Option<DateTime<Utc>>) -> Option<String> {
    ts.map(to_rfc3339)
}

pub fn parse_datetime(raw: String, field: &str) -> DbResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field} timestamp: {raw}"))
}

pub fn parse_datetime_opt(raw: Option<String>, field: &str) -> DbResult<Option<DateTime<Utc>>> {
    raw.map(|value| parse_datetime(value, field)).transpose()
}

pub fn to_json<T: Serialize>(value: &T) -> DbResult<String> {
    serde_json::to_string(value).context("failed to serialize JSON column")
}

pub fn from_json<T: DeserializeOwned>(s: &str) -> DbResult<T> {
    serde_json::from_str(s).context("failed to deserialize JSON column")
}
