//! Miscellaneous support code shared by packdude's binary and library.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fs2::FileExt;

/// An exclusive, advisory lock on a file, held for as long as this value is
/// alive.
///
/// Used to make sure at most one `packdude` instance mutates a given prefix
/// at a time. Acquisition first tries a non-blocking lock so a contended
/// prefix can be reported before blocking on it.
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Acquires the lock file at `path`, creating it (and its parent
    /// directory) if necessary.
    ///
    /// Blocks until the lock is available if another instance currently
    /// holds it, after first emitting a [`tracing::warn!`] so the wait is
    /// visible.
    pub fn acquire(path: &Path) -> io::Result<FileLock> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        if let Err(err) = file.try_lock_exclusive() {
            if err.kind() != io::ErrorKind::WouldBlock {
                return Err(err);
            }
            tracing::warn!(path = %path.display(), "another instance is running; waiting");
            file.lock_exclusive()?;
        }

        Ok(FileLock {
            file,
            path: path.to_owned(),
        })
    }

    /// The path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
