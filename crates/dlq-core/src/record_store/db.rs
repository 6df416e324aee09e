//! SQLite-backed record store.
//!
//! Handles connection, migrations, change notification and timestamp helpers.
//! Record CRUD lives in `records`.

use anyhow::{Context, Result};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::watch;

/// Percent-encode a path for use in a sqlite:// URI so spaces and special chars don't break parsing.
fn path_to_sqlite_uri(path: &Path) -> String {
    let s = path.to_string_lossy();
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '%' => out.push_str("%25"),
            ' ' => out.push_str("%20"),
            '#' => out.push_str("%23"),
            '?' => out.push_str("%3F"),
            '&' => out.push_str("%26"),
            c => out.push(c),
        }
    }
    format!("sqlite://{}", out)
}

/// Default database location: `~/.local/state/dlq/downloads.db`.
pub fn default_db_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("dlq")?;
    Ok(xdg_dirs.get_state_home().join("dlq").join("downloads.db"))
}

/// Handle to the durable download table.
///
/// Cloning is cheap; all clones share the pool and the change counter.
#[derive(Clone)]
pub struct RecordStore {
    pub(crate) pool: Pool<Sqlite>,
    changes: Arc<watch::Sender<u64>>,
    /// Database file; None for in-memory stores.
    location: Option<PathBuf>,
}

impl RecordStore {
    /// Open (or create) the database at a specific path. Creates parent dirs if needed.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("create {}", parent.display()))?;
        }
        let uri = path_to_sqlite_uri(path) + "?mode=rwc";
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect(&uri)
            .await
            .with_context(|| format!("open record store {}", path.display()))?;
        Self::from_pool(pool, Some(path.to_path_buf())).await
    }

    /// In-memory store. One connection, since every sqlite memory connection is its own database.
    pub async fn open_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::from_pool(pool, None).await
    }

    async fn from_pool(pool: Pool<Sqlite>, location: Option<PathBuf>) -> Result<Self> {
        let (tx, _rx) = watch::channel(0u64);
        let store = RecordStore {
            pool,
            changes: Arc::new(tx),
            location,
        };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        // `seq` keeps insertion order as the tie-break for equal `time_queued`.
        // `headers_json` is a JSON object of request headers.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS downloads (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id INTEGER NOT NULL UNIQUE,
                url TEXT NOT NULL,
                path TEXT NOT NULL,
                file_name TEXT NOT NULL,
                tag TEXT NOT NULL DEFAULT '',
                headers_json TEXT NOT NULL DEFAULT '{}',
                metadata TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL,
                user_action TEXT NOT NULL,
                total_bytes INTEGER NOT NULL DEFAULT 0,
                downloaded_bytes INTEGER NOT NULL DEFAULT 0,
                speed REAL NOT NULL DEFAULT 0,
                etag TEXT NOT NULL DEFAULT '',
                job_id TEXT,
                support_pause_resume INTEGER NOT NULL DEFAULT 1,
                time_queued INTEGER NOT NULL,
                last_modified INTEGER NOT NULL,
                failure_reason TEXT NOT NULL DEFAULT ''
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS downloads_status ON downloads (status, time_queued)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS downloads_tag ON downloads (tag)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    /// Receiver that observes a new revision after every committed mutation.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    /// Current revision number.
    pub fn revision(&self) -> u64 {
        *self.changes.borrow()
    }

    /// Called by write operations after their statement commits.
    pub(crate) fn notify_changed(&self) {
        self.changes.send_modify(|rev| *rev = rev.wrapping_add(1));
    }
}

/// Current time as Unix milliseconds (for record timestamps).
pub fn unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
