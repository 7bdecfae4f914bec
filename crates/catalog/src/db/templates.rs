use crate::db::{from_json, query_all, to_json, DbHandle, DbResult};
use anyhow::Context;
use core_types::MetadataTemplate;
use rusqlite::params;

/// A named metadata template known to the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateRow {
    pub id: i64,
    pub template: MetadataTemplate,
}

impl TemplateRow {
    /// Inserts or replaces the template with the same title.
    pub fn upsert<H: DbHandle>(db: &H, template: &MetadataTemplate) -> DbResult<()> {
        anyhow::ensure!(!template.title.is_empty(), "template title must not be empty");
        db.execute(
            "INSERT INTO templates (title, template_json) VALUES (?1, ?2)
             ON CONFLICT(title) DO UPDATE SET template_json = excluded.template_json",
            params![template.title, to_json(template)?],
        )
        .with_context(|| format!("failed to store template {}", template.title))?;
        Ok(())
    }

    pub fn load_all<H: DbHandle>(db: &H) -> DbResult<Vec<Self>> {
        query_all(
            db,
            "SELECT id, template_json FROM templates ORDER BY title",
            [],
            |row| {
                Ok(Self {
                    id: row.get(0)?,
                    template: from_json(&row.get::<_, String>(1)?)?,
                })
            },
        )
    }

    pub fn delete<H: DbHandle>(db: &H, title: &str) -> DbResult<()> {
        db.execute("DELETE FROM templates WHERE title = ?1", params![title])
            .with_context(|| format!("failed to delete template {title}"))?;
        Ok(())
    }
}
