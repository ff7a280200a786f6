//! The catalog store: the set of packages a repository currently offers,
//! mirrored locally as a read side-car to the repository client's cache.

use std::path::Path;

use rusqlite::{Connection, OpenFlags, params};

use crate::error::{PackdudeError, Result};

use super::{PackageInfo, deps_from_db, deps_to_db};

const CREATE_TABLE: &str = "
    CREATE TABLE packages (
        name      TEXT UNIQUE NOT NULL,
        version   TEXT NOT NULL,
        desc      TEXT NOT NULL,
        file_name TEXT UNIQUE NOT NULL,
        arch      TEXT NOT NULL,
        deps      TEXT NOT NULL,
        id        INTEGER PRIMARY KEY
    )";

/// A handle to the catalog store.
pub struct CatalogStore {
    conn: Connection,
}

impl CatalogStore {
    /// Opens an existing catalog for reading. Fails if `path` doesn't exist.
    pub fn open_read(path: &Path) -> Result<CatalogStore> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        Ok(CatalogStore { conn })
    }

    /// Opens the catalog for writing, creating and initializing it inside a
    /// transaction if `path` doesn't already exist.
    pub fn open_write(path: &Path) -> Result<CatalogStore> {
        let existed = path.exists();

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )?;

        if !existed {
            conn.execute_batch(&format!("BEGIN; {CREATE_TABLE}; COMMIT;"))?;
        }

        Ok(CatalogStore { conn })
    }

    /// Looks up a package by name.
    pub fn get(&self, name: &str) -> Result<PackageInfo> {
        self.conn
            .query_row(
                "SELECT name, version, desc, file_name, arch, deps FROM packages WHERE name = ?1",
                params![name],
                row_to_info,
            )
            .map_err(|err| match err {
                rusqlite::Error::QueryReturnedNoRows => {
                    PackdudeError::NotFound(name.to_owned())
                }
                other => PackdudeError::Store(other),
            })
    }

    /// Inserts or replaces a package row.
    pub fn insert(&self, info: &PackageInfo) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO packages (name, version, desc, file_name, arch, deps)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                info.name,
                info.version,
                info.description,
                info.file_name,
                info.arch,
                deps_to_db(&info.deps),
            ],
        )?;
        Ok(())
    }

    /// Deletes a package row by name. A no-op if `name` isn't present.
    pub fn delete(&self, name: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM packages WHERE name = ?1", params![name])?;
        Ok(())
    }

    /// Replaces the entire catalog contents with `entries`, inside one
    /// transaction, so a partially downloaded catalog never becomes visible.
    pub fn replace_all(&mut self, entries: &[PackageInfo]) -> Result<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM packages", [])?;
        for info in entries {
            tx.execute(
                "INSERT INTO packages (name, version, desc, file_name, arch, deps)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    info.name,
                    info.version,
                    info.description,
                    info.file_name,
                    info.arch,
                    deps_to_db(&info.deps),
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Calls `callback` once per row. If `callback` returns
    /// [`PackdudeError::Aborted`], iteration stops and that error
    /// propagates.
    pub fn for_each(&self, mut callback: impl FnMut(&PackageInfo) -> Result<()>) -> Result<()> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, version, desc, file_name, arch, deps FROM packages")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let info = row_to_info(row)?;
            callback(&info)?;
        }
        Ok(())
    }
}

fn row_to_info(row: &rusqlite::Row<'_>) -> rusqlite::Result<PackageInfo> {
    let deps_raw: String = row.get(5)?;
    Ok(PackageInfo {
        name: row.get(0)?,
        version: row.get(1)?,
        description: row.get(2)?,
        file_name: row.get(3)?,
        arch: row.get(4)?,
        deps: deps_from_db(&deps_raw),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(name: &str) -> PackageInfo {
        PackageInfo {
            name: name.to_owned(),
            version: "1.0".to_owned(),
            description: "a package".to_owned(),
            file_name: format!("{name}.bin"),
            arch: "all".to_owned(),
            deps: Vec::new(),
        }
    }

    #[test]
    fn open_write_creates_tables_on_first_use() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.sqlite3");
        let store = CatalogStore::open_write(&path).unwrap();
        assert!(matches!(store.get("nope"), Err(PackdudeError::NotFound(_))));
    }

    #[test]
    fn insert_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.sqlite3");
        let store = CatalogStore::open_write(&path).unwrap();

        let mut info = sample("app");
        info.deps = vec!["libc".to_owned()];
        store.insert(&info).unwrap();

        let fetched = store.get("app").unwrap();
        assert_eq!(fetched, info);
    }

    #[test]
    fn delete_removes_the_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.sqlite3");
        let store = CatalogStore::open_write(&path).unwrap();
        store.insert(&sample("app")).unwrap();
        store.delete("app").unwrap();
        assert!(matches!(store.get("app"), Err(PackdudeError::NotFound(_))));
    }

    #[test]
    fn replace_all_swaps_contents_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.sqlite3");
        let mut store = CatalogStore::open_write(&path).unwrap();
        store.insert(&sample("old")).unwrap();

        store.replace_all(&[sample("new")]).unwrap();

        assert!(matches!(store.get("old"), Err(PackdudeError::NotFound(_))));
        assert!(store.get("new").is_ok());
    }

    #[test]
    fn for_each_visits_every_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.sqlite3");
        let store = CatalogStore::open_write(&path).unwrap();
        store.insert(&sample("a")).unwrap();
        store.insert(&sample("b")).unwrap();

        let mut names = Vec::new();
        store
            .for_each(|info| {
                names.push(info.name.clone());
                Ok(())
            })
            .unwrap();
        names.sort();
        assert_eq!(names, vec!["a".to_owned(), "b".to_owned()]);
    }

    #[test]
    fn for_each_propagates_abort() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.sqlite3");
        let store = CatalogStore::open_write(&path).unwrap();
        store.insert(&sample("a")).unwrap();
        store.insert(&sample("b")).unwrap();

        let mut visited = 0;
        let result = store.for_each(|_| {
            visited += 1;
            Err(PackdudeError::Aborted)
        });
        assert!(matches!(result, Err(PackdudeError::Aborted)));
        assert_eq!(visited, 1);
    }

    #[test]
    fn open_read_fails_if_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.sqlite3");
        assert!(CatalogStore::open_read(&path).is_err());
    }
}
