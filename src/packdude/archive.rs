//! Walks a tar stream, handing each entry's path to a caller-supplied
//! callback before extracting it to disk.
//!
//! The archive region of a package container (see [`crate::package`]) is a
//! plain tar stream rooted under `./`. Extraction order is entry order, not
//! sorted, so the callback sees paths in the same sequence they land on
//! disk: this is what lets an installer register each path in the file
//! manifest before (not after) the corresponding write.

use std::path::Path;

use crate::error::{PackdudeError, Result};

/// Walks the tar stream in `contents`, calling `callback` with each entry's
/// path before extracting it under `dest`.
///
/// The literal root entry `"./"` is skipped without invoking `callback`.
/// Any entry path that isn't rooted under `./` is treated as corrupt data:
/// this format never produces absolute paths or `../` escapes, so seeing one
/// means the archive was tampered with or truncated.
///
/// If `callback` returns an error, extraction stops at that entry and the
/// error propagates to the caller; entries already extracted are not rolled
/// back.
pub fn extract(
    contents: &[u8],
    dest: &Path,
    mut callback: impl FnMut(&str) -> Result<()>,
) -> Result<()> {
    let mut archive = tar::Archive::new(contents);
    archive.set_preserve_permissions(true);
    archive.set_preserve_mtime(true);
    archive.set_preserve_ownerships(true);
    archive.set_unpack_xattrs(true);

    for entry in archive.entries().map_err(PackdudeError::Io)? {
        let mut entry = entry.map_err(PackdudeError::Io)?;

        let path = entry
            .path()
            .map_err(|_| PackdudeError::CorruptData("non UTF-8 archive entry path".into()))?;
        let path = path
            .to_str()
            .ok_or_else(|| PackdudeError::CorruptData("non UTF-8 archive entry path".into()))?
            .to_owned();

        if !path.starts_with("./") {
            return Err(PackdudeError::CorruptData(format!(
                "archive entry {path:?} is not rooted under \"./\""
            )));
        }

        if path == "./" {
            continue;
        }

        callback(&path)?;

        entry.unpack_in(dest).map_err(PackdudeError::Io)?;
    }

    Ok(())
}
