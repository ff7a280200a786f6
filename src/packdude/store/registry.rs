//! The registry store: packages installed on this host, and the file
//! manifest recording every path each one extracted.

use std::path::Path;

use rusqlite::{Connection, OpenFlags, params};

use crate::error::{PackdudeError, Result};

use super::{PackageInfo, Reason, RegistryInfo, deps_from_db, deps_to_db};

const CREATE_TABLES: &str = "
    CREATE TABLE packages (
        name      TEXT UNIQUE NOT NULL,
        version   TEXT NOT NULL,
        desc      TEXT NOT NULL,
        file_name TEXT UNIQUE NOT NULL,
        arch      TEXT NOT NULL,
        deps      TEXT NOT NULL,
        reason    TEXT NOT NULL,
        id        INTEGER PRIMARY KEY
    );
    CREATE TABLE files (
        package TEXT NOT NULL,
        path    TEXT NOT NULL,
        id      INTEGER PRIMARY KEY
    )";

/// A handle to the registry store.
pub struct RegistryStore {
    conn: Connection,
}

impl RegistryStore {
    /// Opens the registry for writing, creating it empty on first use.
    pub fn open(path: &Path) -> Result<RegistryStore> {
        let existed = path.exists();

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )?;

        if !existed {
            conn.execute_batch(&format!("BEGIN; {CREATE_TABLES}; COMMIT;"))?;
        }

        Ok(RegistryStore { conn })
    }

    /// Looks up an installed package by name.
    pub fn get(&self, name: &str) -> Result<RegistryInfo> {
        self.conn
            .query_row(
                "SELECT name, version, desc, file_name, arch, deps, reason
                 FROM packages WHERE name = ?1",
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

    /// Whether `name` is currently installed.
    pub fn contains(&self, name: &str) -> Result<bool> {
        match self.get(name) {
            Ok(_) => Ok(true),
            Err(PackdudeError::NotFound(_)) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Inserts or replaces an installation-data row.
    pub fn insert(&self, entry: &RegistryInfo) -> Result<()> {
        let info = &entry.info;
        self.conn.execute(
            "INSERT OR REPLACE INTO packages
                 (name, version, desc, file_name, arch, deps, reason)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                info.name,
                info.version,
                info.description,
                info.file_name,
                info.arch,
                deps_to_db(&info.deps),
                entry.reason.as_db_str(),
            ],
        )?;
        Ok(())
    }

    /// Deletes an installation-data row. A no-op if `name` isn't present.
    pub fn delete(&self, name: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM packages WHERE name = ?1", params![name])?;
        Ok(())
    }

    /// Calls `callback` once per installed package.
    pub fn for_each(&self, mut callback: impl FnMut(&RegistryInfo) -> Result<()>) -> Result<()> {
        let mut stmt = self.conn.prepare(
            "SELECT name, version, desc, file_name, arch, deps, reason FROM packages",
        )?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let entry = row_to_info(row)?;
            callback(&entry)?;
        }
        Ok(())
    }

    /// Records that `path` was extracted while installing `package`.
    pub fn register_path(&self, package: &str, path: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO files (package, path) VALUES (?1, ?2)",
            params![package, path],
        )?;
        Ok(())
    }

    /// Removes a single file-manifest row by path.
    pub fn unregister_path(&self, path: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM files WHERE path = ?1", params![path])?;
        Ok(())
    }

    /// Calls `callback` once per path `package` installed, most recently
    /// registered first, so children are visited before the parent
    /// directories they live in.
    pub fn for_each_file(
        &self,
        package: &str,
        mut callback: impl FnMut(&str) -> Result<()>,
    ) -> Result<()> {
        let mut stmt = self
            .conn
            .prepare("SELECT path FROM files WHERE package = ?1 ORDER BY id DESC")?;
        let mut rows = stmt.query(params![package])?;
        while let Some(row) = rows.next()? {
            let path: String = row.get(0)?;
            callback(&path)?;
        }
        Ok(())
    }
}

fn row_to_info(row: &rusqlite::Row<'_>) -> rusqlite::Result<RegistryInfo> {
    let deps_raw: String = row.get(5)?;
    let reason_raw: String = row.get(6)?;
    let info = PackageInfo {
        name: row.get(0)?,
        version: row.get(1)?,
        description: row.get(2)?,
        file_name: row.get(3)?,
        arch: row.get(4)?,
        deps: deps_from_db(&deps_raw),
    };
    let reason = Reason::from_db_str(&reason_raw)
        .map_err(|_| rusqlite::Error::InvalidColumnType(6, "reason".into(), rusqlite::types::Type::Text))?;
    Ok(RegistryInfo { info, reason })
}
