use crate::db::{
    from_json, parse_datetime, parse_datetime_opt, query_all, query_one, query_optional, to_json,
    to_rfc3339, to_rfc3339_opt, DbHandle, DbResult,
};
use anyhow::Context;
use chrono::{DateTime, Utc};
use core_types::{pick_label, color_label, ImageSize, ItemPosition, MetadataTemplate, Orientation};
use rusqlite::params;
use serde::{Deserialize, Serialize};

const IMAGE_COLUMNS: &str = "id, path, captured_at, rating, pick_label, color_label, width, height,
     orientation, template_json, gps_latitude, gps_longitude, gps_altitude, created_at, updated_at";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub id: i64,
    pub path: String,
    pub captured_at: Option<DateTime<Utc>>,
    pub rating: i32,
    pub pick_label: i32,
    pub color_label: i32,
    /// Displayed size, after `orientation` is applied.
    pub width: u32,
    pub height: u32,
    pub orientation: Orientation,
    pub template: MetadataTemplate,
    pub position: ItemPosition,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Image {
    pub fn new(path: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            path: path.into(),
            captured_at: None,
            rating: 0,
            pick_label: pick_label::NONE,
            color_label: color_label::NONE,
            width: 0,
            height: 0,
            orientation: Orientation::Normal,
            template: MetadataTemplate::default(),
            position: ItemPosition::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn size(&self) -> ImageSize {
        ImageSize::new(self.width, self.height)
    }

    pub fn insert<H: DbHandle>(&self, db: &H) -> DbResult<i64> {
        db.execute(
            "INSERT INTO images (
                path, captured_at, rating, pick_label, color_label, width, height,
                orientation, template_json, gps_latitude, gps_longitude, gps_altitude,
                created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                self.path,
                to_rfc3339_opt(self.captured_at),
                self.rating,
                self.pick_label,
                self.color_label,
                self.width,
                self.height,
                self.orientation.exif_value(),
                template_column(&self.template)?,
                self.position.latitude,
                self.position.longitude,
                self.position.altitude,
                to_rfc3339(self.created_at),
                to_rfc3339(self.updated_at)
            ],
        )
        .with_context(|| format!("failed to insert image path={}", self.path))?;
        Ok(db.last_insert_rowid())
    }

    pub fn load<H: DbHandle>(db: &H, id: i64) -> DbResult<Self> {
        query_one(
            db,
            &format!("SELECT {IMAGE_COLUMNS} FROM images WHERE id = ?1"),
            params![id],
            Image::from_row,
        )
        .with_context(|| format!("failed to load image id={id}"))
    }

    pub fn find<H: DbHandle>(db: &H, id: i64) -> DbResult<Option<Self>> {
        query_optional(
            db,
            &format!("SELECT {IMAGE_COLUMNS} FROM images WHERE id = ?1"),
            params![id],
            Image::from_row,
        )
        .with_context(|| format!("failed to look up image id={id}"))
    }

    pub fn find_by_path<H: DbHandle>(db: &H, path: &str) -> DbResult<Option<Self>> {
        query_optional(
            db,
            &format!("SELECT {IMAGE_COLUMNS} FROM images WHERE path = ?1"),
            params![path],
            Image::from_row,
        )
        .with_context(|| format!("failed to look up image path={path}"))
    }

    pub fn load_all<H: DbHandle>(db: &H) -> DbResult<Vec<Self>> {
        query_all(
            db,
            &format!("SELECT {IMAGE_COLUMNS} FROM images ORDER BY id"),
            [],
            Image::from_row,
        )
    }

    pub fn delete<H: DbHandle>(db: &H, id: i64) -> DbResult<()> {
        db.execute("DELETE FROM images WHERE id = ?1", params![id])
            .with_context(|| format!("failed to delete image id={id}"))?;
        Ok(())
    }

    pub fn update_captured_at<H: DbHandle>(
        db: &H,
        id: i64,
        captured_at: DateTime<Utc>,
    ) -> DbResult<()> {
        Self::update_column(db, id, "captured_at", to_rfc3339(captured_at))
    }

    pub fn update_rating<H: DbHandle>(db: &H, id: i64, rating: i32) -> DbResult<()> {
        Self::update_column(db, id, "rating", rating)
    }

    pub fn update_pick_label<H: DbHandle>(db: &H, id: i64, label: i32) -> DbResult<()> {
        Self::update_column(db, id, "pick_label", label)
    }

    pub fn update_color_label<H: DbHandle>(db: &H, id: i64, label: i32) -> DbResult<()> {
        Self::update_column(db, id, "color_label", label)
    }

    /// An empty template clears the column.
    pub fn update_template<H: DbHandle>(
        db: &H,
        id: i64,
        template: &MetadataTemplate,
    ) -> DbResult<()> {
        Self::update_column(db, id, "template_json", template_column(template)?)
    }

    fn update_column<H: DbHandle>(
        db: &H,
        id: i64,
        column: &str,
        value: impl rusqlite::ToSql,
    ) -> DbResult<()> {
        let updated = db
            .execute(
                &format!("UPDATE images SET {column} = ?1, updated_at = ?2 WHERE id = ?3"),
                params![value, to_rfc3339(Utc::now()), id],
            )
            .with_context(|| format!("failed to update {column} for image_id={id}"))?;
        anyhow::ensure!(updated == 1, "image id={id} does not exist");
        Ok(())
    }

    pub(crate) fn from_row(row: &rusqlite::Row<'_>) -> DbResult<Self> {
        let template = row
            .get::<_, Option<String>>(9)?
            .map(|raw| from_json::<MetadataTemplate>(&raw))
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            id: row.get(0)?,
            path: row.get(1)?,
            captured_at: parse_datetime_opt(row.get::<_, Option<String>>(2)?, "captured_at")?,
            rating: row.get(3)?,
            pick_label: row.get(4)?,
            color_label: row.get(5)?,
            width: row.get(6)?,
            height: row.get(7)?,
            orientation: Orientation::from_exif(row.get(8)?),
            template,
            position: ItemPosition {
                latitude: row.get(10)?,
                longitude: row.get(11)?,
                altitude: row.get(12)?,
            },
            created_at: parse_datetime(row.get::<_, String>(13)?, "created_at")?,
            updated_at: parse_datetime(row.get::<_, String>(14)?, "updated_at")?,
        })
    }
}

fn template_column(template: &MetadataTemplate) -> DbResult<Option<String>> {
    if template.is_empty() && template.title.is_empty() {
        Ok(None)
    } else {
        to_json(template).map(Some)
    }
}
