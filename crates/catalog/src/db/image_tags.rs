use crate::db::tags::Tag;
use crate::db::{query_all, DbHandle, DbResult};
use anyhow::Context;
use rusqlite::params;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageTag {
    pub image_id: i64,
    pub tag_id: i64,
}

impl ImageTag {
    /// Assigning a tag twice is a no-op.
    pub fn insert<H: DbHandle>(&self, db: &H) -> DbResult<()> {
        db.execute(
            "INSERT OR IGNORE INTO image_tags (image_id, tag_id) VALUES (?1, ?2)",
            params![self.image_id, self.tag_id],
        )
        .with_context(|| {
            format!(
                "failed to assign tag image_id={} tag_id={}",
                self.image_id, self.tag_id
            )
        })?;
        Ok(())
    }

    pub fn delete<H: DbHandle>(db: &H, image_id: i64, tag_id: i64) -> DbResult<()> {
        db.execute(
            "DELETE FROM image_tags WHERE image_id = ?1 AND tag_id = ?2",
            params![image_id, tag_id],
        )
        .with_context(|| format!("failed to remove tag image_id={image_id} tag_id={tag_id}"))?;
        Ok(())
    }

    pub fn tag_ids_for_image<H: DbHandle>(db: &H, image_id: i64) -> DbResult<Vec<i64>> {
        query_all(
            db,
            "SELECT tag_id FROM image_tags WHERE image_id = ?1 ORDER BY tag_id",
            params![image_id],
            |row| Ok(row.get(0)?),
        )
        .with_context(|| format!("failed to list tags for image_id={image_id}"))
    }

    pub fn list_tags_for_image<H: DbHandle>(db: &H, image_id: i64) -> DbResult<Vec<Tag>> {
        query_all(
            db,
            "SELECT t.id, t.parent_id, t.name, t.internal, t.person, t.excluded_from_writing
             FROM tags t
             INNER JOIN image_tags it ON it.tag_id = t.id
             WHERE it.image_id = ?1
             ORDER BY t.name",
            params![image_id],
            Tag::from_row,
        )
    }

    pub fn image_ids_for_tag<H: DbHandle>(db: &H, tag_id: i64) -> DbResult<Vec<i64>> {
        query_all(
            db,
            "SELECT image_id FROM image_tags WHERE tag_id = ?1 ORDER BY image_id",
            params![tag_id],
            |row| Ok(row.get(0)?),
        )
    }
}
