//! Filesystem probe primitives over sysfs
//!
//! Thin, stateless wrappers around `std::fs` used by the classifier and
//! scanner. sysfs attribute files are single-line and newline-terminated,
//! so reads go through [`read_trimmed`]; marker files carry meaning by
//! presence alone, tested with [`exists`]; driver-created subdirectories
//! have versioned names and are located with [`first_with_prefix`].

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

/// Test whether a path exists.
///
/// A genuine access failure (e.g. permission denied on a parent) is not
/// distinguishable from absence here; both report `false`. Marker files in
/// sysfs are world-readable, so the collapse is harmless in practice.
pub fn exists(path: impl AsRef<Path>) -> bool {
    path.as_ref().exists()
}

/// Read a file's entire content with leading/trailing newlines stripped.
///
/// sysfs attributes are newline-terminated single values; the trimmed
/// string is the value.
pub fn read_trimmed(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let buf = fs::read_to_string(path).map_err(|source| Error::FileRead {
        path: path.display().to_string(),
        source,
    })?;
    Ok(buf.trim_matches('\n').to_string())
}

/// Return the first entry of `dir` whose name starts with `prefix`.
///
/// Entries are visited in whatever order the filesystem yields them.
/// `Ok(None)` means the directory was readable but nothing matched; an
/// error is returned only when the directory itself cannot be listed.
pub fn first_with_prefix(dir: impl AsRef<Path>, prefix: &str) -> Result<Option<String>> {
    let dir = dir.as_ref();
    let entries = fs::read_dir(dir).map_err(|source| Error::DirectoryList {
        path: dir.display().to_string(),
        source,
    })?;

    for entry in entries {
        let entry = entry.map_err(|source| Error::DirectoryList {
            path: dir.display().to_string(),
            source,
        })?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(prefix) {
            return Ok(Some(name));
        }
    }

    Ok(None)
}
