//! One engine per record database.
//!
//! The process that owns the queue holds an exclusive `flock` on a lock file
//! next to the database for as long as it lives. Restart recovery rewrites
//! every in-flight record, so it must only run while this lock is held.

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Held lock; released on drop.
#[derive(Debug)]
pub struct EngineLock {
    _file: File,
}

impl EngineLock {
    /// Lock file guarding the database at `db_path`.
    pub fn path_for(db_path: &Path) -> PathBuf {
        let mut name = db_path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Take the lock, or `None` when another live handle holds it. The lock is
    /// released when the returned value is dropped or the process exits.
    pub fn try_acquire(path: &Path) -> Result<Option<Self>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)
            .with_context(|| format!("open engine lock {}", path.display()))?;
        if !lock_exclusive(&file).with_context(|| format!("lock {}", path.display()))? {
            return Ok(None);
        }
        // Holder's pid, for humans.
        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;
        tracing::debug!(lock = %path.display(), "engine lock acquired");
        Ok(Some(Self { _file: file }))
    }
}

#[cfg(unix)]
fn lock_exclusive(file: &File) -> io::Result<bool> {
    use std::os::unix::io::AsRawFd;

    let r = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if r == 0 {
        return Ok(true);
    }
    let err = io::Error::last_os_error();
    if err.kind() == io::ErrorKind::WouldBlock {
        Ok(false)
    } else {
        Err(err)
    }
}

// No advisory locking here: every process believes it owns the queue.
#[cfg(not(unix))]
fn lock_exclusive(_file: &File) -> io::Result<bool> {
    Ok(true)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn second_holder_is_refused_until_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = EngineLock::path_for(&dir.path().join("downloads.db"));
        assert!(path.ends_with("downloads.db.lock"));

        let first = EngineLock::try_acquire(&path).unwrap().expect("first lock");
        assert!(EngineLock::try_acquire(&path).unwrap().is_none());
        let pid = std::fs::read_to_string(&path).unwrap();
        assert_eq!(pid.trim(), std::process::id().to_string());

        drop(first);
        assert!(EngineLock::try_acquire(&path).unwrap().is_some());
    }
}
