//! Engine wiring shared by the commands, and the foreground progress follower.
//!
//! At most one process owns a record database (the engine lock in
//! `DownloadManager::start`). Every other `dlq` invocation forwards its
//! request to that process over the control socket.

use anyhow::Result;
use dlq_core::record_store::default_db_path;
use dlq_core::{
    DlqConfig, DownloadId, DownloadManager, DownloadModel, LocalJobRunner, RecordStore, Status,
    TracingNotifier,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::control_socket::{self, ControlListener, ControlRequest};

pub(crate) fn db_path(cfg: &DlqConfig) -> Result<PathBuf> {
    match &cfg.db_path {
        Some(path) => Ok(path.clone()),
        None => default_db_path(),
    }
}

pub(crate) async fn open_store(cfg: &DlqConfig) -> Result<RecordStore> {
    RecordStore::open_at(db_path(cfg)?).await
}

/// Who runs the queue for this command.
pub(crate) enum Engine {
    /// This process owns the queue and serves the control socket while it lives.
    Local {
        manager: Arc<DownloadManager>,
        _listener: Option<ControlListener>,
    },
    /// Another `dlq` process owns the queue; requests go through its socket.
    Remote(PathBuf),
}

impl Engine {
    /// Apply `request` wherever the queue is owned; returns the line to print.
    pub(crate) async fn request(&self, request: ControlRequest) -> Result<String> {
        match self {
            Engine::Local { manager, .. } => control_socket::apply(manager, request).await,
            Engine::Remote(socket) => control_socket::send(socket, &request).await,
        }
    }
}

/// Become the engine for the configured database, or find the one that is.
///
/// With `admit` false the local manager admits nothing and serves no socket:
/// record-only changes for pause, cancel and clear when no engine is running.
pub(crate) async fn attach(mut cfg: DlqConfig, admit: bool) -> Result<Engine> {
    let socket = control_socket::socket_path_for(&db_path(&cfg)?);
    if !admit {
        cfg.max_parallel_downloads = 0;
    }
    let store = open_store(&cfg).await?;
    let manager = match DownloadManager::start(
        store,
        Arc::new(LocalJobRunner::new()),
        Arc::new(TracingNotifier),
        cfg,
    )
    .await
    {
        Ok(manager) => manager,
        Err(e) if e.is_engine_running() => {
            tracing::debug!(socket = %socket.display(), "{}", e);
            return Ok(Engine::Remote(socket));
        }
        Err(e) => return Err(e.into()),
    };
    let listener = if admit {
        match control_socket::spawn_control_listener(&manager, &socket) {
            Ok(listener) => {
                tracing::debug!(path = %socket.display(), "control socket listening");
                Some(listener)
            }
            Err(e) => {
                tracing::warn!("control socket unavailable: {:#}", e);
                None
            }
        }
    } else {
        None
    };
    Ok(Engine::Local {
        manager,
        _listener: listener,
    })
}

fn mib(bytes: u64) -> f64 {
    bytes as f64 / 1_048_576.0
}

pub(crate) fn describe(m: &DownloadModel) -> String {
    let size = if m.total_bytes > 0 {
        format!("{:.1} / {:.1} MiB", mib(m.downloaded_bytes), mib(m.total_bytes))
    } else {
        format!("{:.1} MiB", mib(m.downloaded_bytes))
    };
    let mut line = format!(
        "{:<20} {:<10} {:>3}%  {}",
        m.id,
        m.status.as_str(),
        m.progress,
        size
    );
    if m.status == Status::Progress {
        // bytes/ms -> MiB/s
        line.push_str(&format!("  {:.2} MiB/s", f64::from(m.speed) * 1000.0 / 1_048_576.0));
    }
    if m.status == Status::Failed && !m.failure_reason.is_empty() {
        line.push_str(&format!("  ({})", m.failure_reason));
    }
    format!("{}  {}", line, m.file_name)
}

/// Print progress until no download is in flight. Ctrl-C pauses everything
/// and keeps following until the pauses have landed.
pub(crate) async fn follow(manager: &DownloadManager) -> Result<Vec<DownloadModel>> {
    let mut observation = manager.observer().observe_all();
    let mut shown: HashMap<DownloadId, (Status, u8)> = HashMap::new();
    let mut interrupted = false;

    loop {
        tokio::select! {
            models = observation.next() => {
                let Some(models) = models else {
                    return Ok(Vec::new());
                };
                for m in &models {
                    let key = (m.status, m.progress);
                    if shown.get(&m.id) != Some(&key) {
                        println!("{}", describe(m));
                        shown.insert(m.id, key);
                    }
                }
                if !models.iter().any(|m| m.status.is_in_flight()) {
                    return Ok(models);
                }
            }
            signal = tokio::signal::ctrl_c(), if !interrupted => {
                signal?;
                interrupted = true;
                eprintln!("interrupted, pausing downloads...");
                manager.pause_all().await?;
            }
        }
    }
}
