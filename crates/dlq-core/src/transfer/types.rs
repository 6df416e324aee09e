//! Transfer request, events, outcome and error types.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::storage;
use crate::target;

/// Everything one transfer needs; built from a record plus configuration.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub url: String,
    pub path: String,
    pub file_name: String,
    /// Sent on every request, including the probe after a rejected range.
    pub headers: HashMap<String, String>,
    /// When false, existing partial bytes are discarded and length is reported as unknown.
    pub support_pause_resume: bool,
    pub connect_timeout: Duration,
    /// Transfer is aborted once no byte arrived for this long.
    pub read_timeout: Duration,
    /// Minimum spacing between progress events.
    pub progress_interval: Duration,
}

impl TransferRequest {
    pub fn final_path(&self) -> PathBuf {
        target::final_path(&self.path, &self.file_name)
    }

    pub fn temp_path(&self) -> PathBuf {
        storage::temp_path(&self.final_path())
    }
}

/// Callbacks of a running transfer, delivered in order over a channel.
#[derive(Debug, Clone, PartialEq)]
pub enum TransferEvent {
    /// Response accepted; `total_bytes` is 0 when the length is unknown.
    Started { total_bytes: u64 },
    /// `speed` is bytes per millisecond over the last sampling window.
    Progress {
        downloaded_bytes: u64,
        total_bytes: u64,
        speed: f32,
    },
    /// The server rejected the resume; the partial file was discarded and the
    /// transfer starts over. `etag` is the re-probed validator, None if the probe failed.
    Restarted { etag: Option<String> },
}

/// How a transfer ended without error. Cancellation is an outcome, not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    Completed { total_bytes: u64, downloaded_bytes: u64 },
    /// Abort token was set; the partial file holds `downloaded_bytes` whole chunks.
    Cancelled { downloaded_bytes: u64 },
}

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("server returned HTTP {0}")]
    Http(u32),

    #[error("server returned HTTP {0} without a body")]
    MissingBody(u32),

    #[error("resume rejected twice: {0}")]
    ResumeRejected(String),

    #[error("network error: {0}")]
    Curl(#[from] curl::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage error: {0:#}")]
    Storage(anyhow::Error),

    #[error("could not move download into place: {0:#}")]
    Finalize(anyhow::Error),

    #[error("transfer task failed: {0}")]
    Join(String),
}
