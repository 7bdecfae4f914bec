use crate::db::{query_all, DbHandle, DbResult};
use anyhow::Context;
use core_types::{FaceRegion, Rect, TagId};
use rusqlite::params;
use serde::{Deserialize, Serialize};

const FACE_COLUMNS: &str = "id, image_id, tag_id, x, y, width, height, confirmed";

/// A face rectangle in displayed-image pixels, bound to a person tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceRegionRow {
    pub id: i64,
    pub image_id: i64,
    pub tag_id: i64,
    pub region: Rect,
    pub confirmed: bool,
}

impl FaceRegionRow {
    pub fn insert<H: DbHandle>(&self, db: &H) -> DbResult<i64> {
        db.execute(
            "INSERT INTO face_regions (image_id, tag_id, x, y, width, height, confirmed)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                self.image_id,
                self.tag_id,
                self.region.x,
                self.region.y,
                self.region.width,
                self.region.height,
                self.confirmed
            ],
        )
        .with_context(|| format!("failed to insert face region image_id={}", self.image_id))?;
        Ok(db.last_insert_rowid())
    }

    pub fn list_for_image<H: DbHandle>(db: &H, image_id: i64) -> DbResult<Vec<Self>> {
        query_all(
            db,
            &format!("SELECT {FACE_COLUMNS} FROM face_regions WHERE image_id = ?1 ORDER BY id"),
            params![image_id],
            FaceRegionRow::from_row,
        )
        .with_context(|| format!("failed to list face regions image_id={image_id}"))
    }

    /// Moves every region of `image_id` equal to `region` (rectangle and tag) onto `to_tag`.
    pub fn reassign<H: DbHandle>(
        db: &H,
        image_id: i64,
        region: &FaceRegion,
        to_tag: i64,
    ) -> DbResult<usize> {
        let Rect {
            x,
            y,
            width,
            height,
        } = region.region;
        db.execute(
            "UPDATE face_regions SET tag_id = ?1
             WHERE image_id = ?2 AND tag_id = ?3
               AND x = ?4 AND y = ?5 AND width = ?6 AND height = ?7",
            params![to_tag, image_id, region.tag_id.0, x, y, width, height],
        )
        .with_context(|| {
            format!(
                "failed to reassign face region image_id={image_id} tag_id={}",
                region.tag_id.0
            )
        })
    }

    pub fn to_face_region(&self) -> FaceRegion {
        FaceRegion {
            tag_id: TagId(self.tag_id),
            region: self.region,
            confirmed: self.confirmed,
        }
    }

    fn from_row(row: &rusqlite::Row<'_>) -> DbResult<Self> {
        Ok(Self {
            id: row.get(0)?,
            image_id: row.get(1)?,
            tag_id: row.get(2)?,
            region: Rect::new(row.get(3)?, row.get(4)?, row.get(5)?, row.get(6)?),
            confirmed: row.get(7)?,
        })
    }
}
