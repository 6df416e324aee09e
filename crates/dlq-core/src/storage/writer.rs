//! Sequential writer for the `.part` file.

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::Path;

/// Open `.part` file positioned at its end. Only whole chunks are ever written,
/// so its length always equals the bytes accepted so far.
pub struct PartialFile {
    file: File,
    written: u64,
}

impl PartialFile {
    /// Open for a transfer starting at `offset`: 0 creates or truncates, anything
    /// else keeps the existing bytes and appends.
    pub fn open(path: &Path, offset: u64) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create download dir {}", parent.display()))?;
        }
        let mut file = File::options()
            .create(true)
            .write(true)
            .truncate(offset == 0)
            .open(path)
            .with_context(|| format!("open partial file {}", path.display()))?;
        let written = file.seek(SeekFrom::End(0))?;
        Ok(Self { file, written })
    }

    pub fn write_chunk(&mut self, data: &[u8]) -> std::io::Result<()> {
        self.file.write_all(data)?;
        self.written += data.len() as u64;
        Ok(())
    }

    /// Drop everything written so far (server ignored the range request).
    pub fn restart(&mut self) -> std::io::Result<()> {
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        self.written = 0;
        Ok(())
    }

    /// Bytes currently in the file.
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn sync(&self) -> Result<()> {
        self.file.sync_all().context("sync partial file")?;
        Ok(())
    }
}

/// Move the completed `.part` file to `final_path`. Falls back to copy + delete
/// when rename fails (e.g. across filesystems).
pub fn finalize(temp_path: &Path, final_path: &Path) -> Result<()> {
    finalize_with(temp_path, final_path, |from, to| fs::rename(from, to))
}

fn finalize_with(
    temp_path: &Path,
    final_path: &Path,
    rename: impl FnOnce(&Path, &Path) -> io::Result<()>,
) -> Result<()> {
    let Err(rename_err) = rename(temp_path, final_path) else {
        return Ok(());
    };
    tracing::warn!(
        "rename {} -> {} failed ({}), copying instead",
        temp_path.display(),
        final_path.display(),
        rename_err
    );
    fs::copy(temp_path, final_path).with_context(|| {
        format!(
            "copy {} -> {} after rename failed: {}",
            temp_path.display(),
            final_path.display(),
            rename_err
        )
    })?;
    fs::remove_file(temp_path)
        .with_context(|| format!("remove {} after copy", temp_path.display()))?;
    Ok(())
}
