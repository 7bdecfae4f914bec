use crate::db::{query_all, DbHandle, DbResult};
use anyhow::Context;
use core_types::CaptionsMap;
use rusqlite::params;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptionKind {
    Title,
    Comment,
}

impl CaptionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CaptionKind::Title => "title",
            CaptionKind::Comment => "comment",
        }
    }
}

/// One language entry of an image title or comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptionRow {
    pub image_id: i64,
    pub kind: CaptionKind,
    pub language: String,
    pub text: String,
}

impl CaptionRow {
    pub fn insert<H: DbHandle>(&self, db: &H) -> DbResult<()> {
        db.execute(
            "INSERT INTO captions (image_id, kind, language, text) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(image_id, kind, language) DO UPDATE SET text = excluded.text",
            params![self.image_id, self.kind.as_str(), self.language, self.text],
        )
        .with_context(|| {
            format!(
                "failed to insert {} caption image_id={} language={}",
                self.kind.as_str(),
                self.image_id,
                self.language
            )
        })?;
        Ok(())
    }

    pub fn load_map<H: DbHandle>(db: &H, image_id: i64, kind: CaptionKind) -> DbResult<CaptionsMap> {
        let entries = query_all(
            db,
            "SELECT language, text FROM captions
             WHERE image_id = ?1 AND kind = ?2
             ORDER BY language",
            params![image_id, kind.as_str()],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
        )
        .with_context(|| format!("failed to load {} captions image_id={image_id}", kind.as_str()))?;
        Ok(entries.into_iter().collect())
    }

    /// Replaces every language of `kind`; an empty map removes them all.
    pub fn replace_map<H: DbHandle>(
        db: &H,
        image_id: i64,
        kind: CaptionKind,
        captions: &CaptionsMap,
    ) -> DbResult<()> {
        db.execute(
            "DELETE FROM captions WHERE image_id = ?1 AND kind = ?2",
            params![image_id, kind.as_str()],
        )
        .with_context(|| format!("failed to clear {} captions image_id={image_id}", kind.as_str()))?;

        for (language, text) in captions.iter() {
            CaptionRow {
                image_id,
                kind,
                language: language.to_string(),
                text: text.to_string(),
            }
            .insert(db)?;
        }
        Ok(())
    }
}
