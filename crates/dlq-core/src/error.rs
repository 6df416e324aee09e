//! Errors surfaced across the engine's public API.
//!
//! Only validation and infrastructure failures are returned to callers.
//! Transfer failures are captured into the record (`failure_reason`) instead.

use std::path::PathBuf;
use thiserror::Error;

/// Request rejected before any state was touched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("download url is empty")]
    EmptyUrl,
    #[error("download path is empty")]
    EmptyPath,
    #[error("download file name is empty")]
    EmptyFileName,
    #[error("notifications are enabled but not permitted by the host; disable notifications_enabled or grant permission")]
    NotificationsNotPermitted,
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Another process already runs an engine over the same record database.
    #[error("another dlq engine owns {}", .0.display())]
    EngineRunning(PathBuf),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl DownloadError {
    pub fn is_validation(&self) -> bool {
        matches!(self, DownloadError::Validation(_))
    }

    pub fn is_engine_running(&self) -> bool {
        matches!(self, DownloadError::EngineRunning(_))
    }
}
