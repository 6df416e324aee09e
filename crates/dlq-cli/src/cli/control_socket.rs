//! Control socket: served by the process that owns the queue, used by every
//! other `dlq` process to reach it.
//! Protocol: one JSON [`ControlRequest`] per line, answered by one JSON
//! [`ControlReply`] line.

use anyhow::{Context, Result};
use dlq_core::record_store::{unix_millis, DownloadRecord};
use dlq_core::{DownloadManager, DownloadRequest};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::task::JoinHandle;

use crate::cli::commands::ClearTarget;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ControlRequest {
    Download { request: DownloadRequest },
    Pause { id: i64 },
    Resume { id: i64 },
    Retry { id: i64 },
    Cancel { id: i64 },
    Clear { target: ClearTarget, delete_files: bool },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlReply {
    pub ok: bool,
    /// Line shown to the user (or the error).
    pub message: String,
}

/// Socket next to the record database: `<db>.sock`.
pub fn socket_path_for(db_path: &Path) -> PathBuf {
    let mut name = db_path.as_os_str().to_owned();
    name.push(".sock");
    PathBuf::from(name)
}

async fn existing(manager: &DownloadManager, id: i64) -> Result<DownloadRecord> {
    manager
        .get(id)
        .await?
        .with_context(|| format!("no download with id {id}"))
}

/// Apply a request to a manager this process owns.
pub async fn apply(manager: &DownloadManager, request: ControlRequest) -> Result<String> {
    let line = match request {
        ControlRequest::Download { request } => {
            let id = manager.download(request.clone()).await?;
            format!(
                "Queued download {id}: {} -> {}/{}",
                request.url, request.path, request.file_name
            )
        }
        ControlRequest::Pause { id } => {
            let before = existing(manager, id).await?.status;
            manager.pause(id).await?;
            let after = manager.get(id).await?.map(|r| r.status).unwrap_or(before);
            format!("Download {id}: {} -> {}", before.as_str(), after.as_str())
        }
        ControlRequest::Resume { id } => {
            existing(manager, id).await?;
            manager.resume(id).await?;
            format!("Resumed download {id}")
        }
        ControlRequest::Retry { id } => {
            existing(manager, id).await?;
            manager.retry(id).await?;
            format!("Retrying download {id}")
        }
        ControlRequest::Cancel { id } => {
            existing(manager, id).await?;
            manager.cancel(id).await?;
            format!("Cancelled download {id}")
        }
        ControlRequest::Clear {
            target,
            delete_files,
        } => {
            match &target {
                ClearTarget::All => manager.clear_all_db(delete_files).await?,
                ClearTarget::Id(id) => manager.clear_db(*id, delete_files).await?,
                ClearTarget::Tag(tag) => manager.clear_db_by_tag(tag, delete_files).await?,
                ClearTarget::OlderThan(secs) => {
                    let age_ms = i64::try_from(secs.saturating_mul(1000)).unwrap_or(i64::MAX);
                    let cutoff = unix_millis().saturating_sub(age_ms);
                    manager.clear_db_older_than(cutoff, delete_files).await?
                }
            }
            let files = if delete_files { "records and files" } else { "records" };
            match target {
                ClearTarget::All => format!("Cleared all {files}"),
                ClearTarget::Id(id) => format!("Cleared {files} of download {id}"),
                ClearTarget::Tag(tag) => format!("Cleared {files} tagged {tag:?}"),
                ClearTarget::OlderThan(secs) => format!("Cleared {files} older than {secs}s"),
            }
        }
    };
    Ok(line)
}

/// Listener task; stops serving and removes the socket file when dropped.
pub struct ControlListener {
    path: PathBuf,
    task: JoinHandle<()>,
}

impl Drop for ControlListener {
    fn drop(&mut self) {
        self.task.abort();
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Bind `path` and serve requests against `manager` until dropped. Only the
/// engine-lock holder may call this, so a leftover socket file is stale.
pub fn spawn_control_listener(manager: &Arc<DownloadManager>, path: &Path) -> Result<ControlListener> {
    let _ = std::fs::remove_file(path);
    let listener = UnixListener::bind(path)
        .with_context(|| format!("bind control socket {}", path.display()))?;
    let manager = Arc::downgrade(manager);
    let task = tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    tokio::spawn(serve(Weak::clone(&manager), stream));
                }
                Err(e) => tracing::debug!("control socket accept: {}", e),
            }
        }
    });
    Ok(ControlListener {
        path: path.to_path_buf(),
        task,
    })
}

async fn serve(manager: Weak<DownloadManager>, stream: UnixStream) {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let reply = match serde_json::from_str::<ControlRequest>(line.trim()) {
            Err(e) => ControlReply {
                ok: false,
                message: format!("malformed control request: {e}"),
            },
            Ok(request) => {
                let Some(manager) = manager.upgrade() else {
                    return;
                };
                tracing::debug!(?request, "control request");
                match apply(&manager, request).await {
                    Ok(message) => ControlReply { ok: true, message },
                    Err(e) => ControlReply {
                        ok: false,
                        message: format!("{e:#}"),
                    },
                }
            }
        };
        let Ok(mut out) = serde_json::to_string(&reply) else {
            return;
        };
        out.push('\n');
        if write.write_all(out.as_bytes()).await.is_err() {
            return;
        }
    }
}

/// Send one request to the engine listening on `path` and return its reply line.
pub async fn send(path: &Path, request: &ControlRequest) -> Result<String> {
    let stream = UnixStream::connect(path).await.with_context(|| {
        format!(
            "another dlq engine holds the queue but its control socket {} is unreachable",
            path.display()
        )
    })?;
    let (read, mut write) = stream.into_split();
    let mut line = serde_json::to_string(request)?;
    line.push('\n');
    write.write_all(line.as_bytes()).await?;

    let reply = BufReader::new(read)
        .lines()
        .next_line()
        .await?
        .context("engine closed the control connection")?;
    let reply: ControlReply = serde_json::from_str(&reply)?;
    if reply.ok {
        Ok(reply.message)
    } else {
        anyhow::bail!(reply.message)
    }
}
