//! Download targets: stable ids, on-disk layout, filename derivation.

mod name;

pub use name::derive_file_name;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::record_store::DownloadId;
use crate::storage;

/// Stable id for (url, path, file name): the first 8 bytes of a SHA-256 over the
/// three fields, masked to a non-negative `i64`.
///
/// Fields are NUL-separated so ("ab", "c") and ("a", "bc") never collide.
pub fn download_id(url: &str, path: &str, file_name: &str) -> DownloadId {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hasher.update([0u8]);
    hasher.update(path.as_bytes());
    hasher.update([0u8]);
    hasher.update(file_name.as_bytes());
    let digest = hasher.finalize();
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    i64::from_be_bytes(head) & i64::MAX
}

/// `<path>/<file_name>`.
pub fn final_path(path: &str, file_name: &str) -> PathBuf {
    Path::new(path).join(file_name)
}

/// Delete both the final file and its `.part` sibling. Missing files are not an error.
pub async fn delete_download_files(path: &str, file_name: &str) -> Result<()> {
    let final_path = final_path(path, file_name);
    let part = storage::temp_path(&final_path);
    for p in [&final_path, &part] {
        match tokio::fs::remove_file(p).await {
            Ok(()) => tracing::debug!("deleted {}", p.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e).with_context(|| format!("delete {}", p.display())),
        }
    }
    Ok(())
}
