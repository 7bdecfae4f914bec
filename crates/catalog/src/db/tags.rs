use crate::db::{query_all, query_one, query_optional, DbHandle, DbResult};
use anyhow::Context;
use rusqlite::params;
use serde::{Deserialize, Serialize};

const TAG_COLUMNS: &str = "id, parent_id, name, internal, person, excluded_from_writing";

/// Node of the tag hierarchy. Root tags have no parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub name: String,
    pub internal: bool,
    pub person: bool,
    pub excluded_from_writing: bool,
}

impl Tag {
    pub fn new(parent_id: Option<i64>, name: impl Into<String>) -> Self {
        Self {
            id: 0,
            parent_id,
            name: name.into(),
            internal: false,
            person: false,
            excluded_from_writing: false,
        }
    }

    pub fn insert<H: DbHandle>(&self, db: &H) -> DbResult<i64> {
        db.execute(
            "INSERT INTO tags (parent_id, name, internal, person, excluded_from_writing)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                self.parent_id,
                self.name,
                self.internal,
                self.person,
                self.excluded_from_writing
            ],
        )
        .with_context(|| format!("failed to insert tag {}", self.name))?;
        Ok(db.last_insert_rowid())
    }

    pub fn load<H: DbHandle>(db: &H, id: i64) -> DbResult<Self> {
        query_one(
            db,
            &format!("SELECT {TAG_COLUMNS} FROM tags WHERE id = ?1"),
            params![id],
            Tag::from_row,
        )
        .with_context(|| format!("failed to load tag id={id}"))
    }

    pub fn load_all<H: DbHandle>(db: &H) -> DbResult<Vec<Self>> {
        query_all(
            db,
            &format!("SELECT {TAG_COLUMNS} FROM tags ORDER BY id"),
            [],
            Tag::from_row,
        )
    }

    pub fn find_child<H: DbHandle>(
        db: &H,
        parent_id: Option<i64>,
        name: &str,
    ) -> DbResult<Option<Self>> {
        query_optional(
            db,
            &format!(
                "SELECT {TAG_COLUMNS} FROM tags
                 WHERE IFNULL(parent_id, 0) = IFNULL(?1, 0) AND name = ?2"
            ),
            params![parent_id, name],
            Tag::from_row,
        )
        .with_context(|| format!("failed to look up tag {name}"))
    }

    /// Resolves a slash separated path, creating missing nodes. Newly created
    /// nodes get the flags of `template`; existing ones are left untouched.
    pub fn get_or_create_path<H: DbHandle>(db: &H, path: &str, template: &Tag) -> DbResult<Self> {
        let mut parent: Option<Tag> = None;
        for name in path.split('/').filter(|segment| !segment.is_empty()) {
            let parent_id = parent.as_ref().map(|tag| tag.id);
            let tag = match Tag::find_child(db, parent_id, name)? {
                Some(existing) => existing,
                None => {
                    let mut created = Tag {
                        id: 0,
                        parent_id,
                        name: name.to_string(),
                        ..template.clone()
                    };
                    created.id = created.insert(db)?;
                    created
                }
            };
            parent = Some(tag);
        }
        parent.with_context(|| format!("tag path {path:?} has no segments"))
    }

    pub fn update<H: DbHandle>(&self, db: &H) -> DbResult<()> {
        db.execute(
            "UPDATE tags
             SET parent_id = ?1, name = ?2, internal = ?3, person = ?4, excluded_from_writing = ?5
             WHERE id = ?6",
            params![
                self.parent_id,
                self.name,
                self.internal,
                self.person,
                self.excluded_from_writing,
                self.id
            ],
        )
        .with_context(|| format!("failed to update tag id={}", self.id))?;
        Ok(())
    }

    /// Children and image assignments are removed with the tag.
    pub fn delete<H: DbHandle>(db: &H, id: i64) -> DbResult<()> {
        db.execute("DELETE FROM tags WHERE id = ?1", params![id])
            .with_context(|| format!("failed to delete tag id={id}"))?;
        Ok(())
    }

    pub(crate) fn from_row(row: &rusqlite::Row<'_>) -> DbResult<Self> {
        Ok(Self {
            id: row.get(0)?,
            parent_id: row.get(1)?,
            name: row.get(2)?,
            internal: row.get(3)?,
            person: row.get(4)?,
            excluded_from_writing: row.get(5)?,
        })
    }
}
