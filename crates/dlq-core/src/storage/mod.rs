//! Partial/final file pair for one download.
//!
//! Bytes land in `<final>.part` and are renamed into place once complete.
//! The `.part` length is the resume offset.

mod writer;

pub use writer::{finalize, PartialFile};

use std::path::{Path, PathBuf};

/// Temporary file suffix used before the final rename.
pub const TEMP_SUFFIX: &str = ".part";

/// Path for the temp file: appends `.part` to the final path (e.g. `file.iso` → `file.iso.part`).
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// Length of an existing partial file, 0 when there is none.
pub fn partial_len(temp_path: &Path) -> u64 {
    std::fs::metadata(temp_path).map(|m| m.len()).unwrap_or(0)
}

/// Remove the partial file if present.
pub fn discard_partial(temp_path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(temp_path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
