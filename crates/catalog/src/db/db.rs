use std::path::{Path, PathBuf};

use anyhow::Context;
use rusqlite::{Connection, Transaction};
use tracing::{debug, warn};

use crate::db::DbResult;
use crate::schema::initialize_schema;

use super::DbHandle;

/// Owned connection to one catalog file, schema already initialized.
#[derive(Debug)]
pub struct CatalogDb {
    conn: Connection,
    path: Option<PathBuf>,
}

impl CatalogDb {
    pub fn open(path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open catalog {}", path.display()))?;
        initialize_schema(&conn)
            .with_context(|| format!("failed to initialize catalog {}", path.display()))?;
        debug!(path = %path.display(), "catalog database ready");
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    pub fn in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn, path: None })
    }

    /// `None` for in-memory catalogs.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Runs `work` in a transaction that commits on `Ok` and rolls back otherwise.
    pub fn with_transaction<T>(
        &self,
        work: impl FnOnce(&Transaction<'_>) -> DbResult<T>,
    ) -> DbResult<T> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("failed to begin transaction")?;
        match work(&tx) {
            Ok(value) => {
                tx.commit().context("failed to commit transaction")?;
                Ok(value)
            }
            Err(err) => {
                warn!(error = %err, "rolling back catalog transaction");
                Err(err)
            }
        }
    }
}

impl DbHandle for CatalogDb {
    fn connection(&self) -> &Connection {
        &self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Image;

    #[test]
    fn failed_work_rolls_back() {
        let db = CatalogDb::in_memory().unwrap();
        assert!(db.path().is_none());

        let result: DbResult<()> = db.with_transaction(|tx| {
            Image::new("/photos/a.jpg").insert(tx)?;
            anyhow::bail!("abort")
        });
        assert!(result.is_err());
        assert!(Image::load_all(&db).unwrap().is_empty());

        let id = db
            .with_transaction(|tx| Image::new("/photos/b.jpg").insert(tx))
            .unwrap();
        assert_eq!(Image::load_all(&db).unwrap()[0].id, id);
    }
}
