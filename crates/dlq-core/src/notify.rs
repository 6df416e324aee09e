//! Presentation collaborator: receives terminal-state events and owns
//! everything about how they are shown.

use crate::record_store::DownloadId;

#[derive(Debug, Clone, PartialEq)]
pub enum TerminalKind {
    Success { total_bytes: u64 },
    Failed { reason: String, progress: u8 },
    Cancelled,
    Paused { progress: u8 },
}

/// Enough to render a completion/failure/pause notice with resume, retry and cancel actions.
#[derive(Debug, Clone, PartialEq)]
pub struct TerminalEvent {
    pub id: DownloadId,
    pub file_name: String,
    pub kind: TerminalKind,
}

pub trait NotificationSink: Send + Sync {
    /// Whether the host allows showing notifications at all.
    fn permitted(&self) -> bool {
        true
    }

    fn notify(&self, event: &TerminalEvent);

    /// Drop any presentation state for a cleared download.
    fn clear(&self, id: DownloadId);
}

/// Writes terminal events to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl NotificationSink for TracingNotifier {
    fn notify(&self, event: &TerminalEvent) {
        match &event.kind {
            TerminalKind::Success { total_bytes } => {
                tracing::info!(id = event.id, "{} finished ({} bytes)", event.file_name, total_bytes)
            }
            TerminalKind::Failed { reason, progress } => {
                tracing::warn!(id = event.id, "{} failed at {}%: {}", event.file_name, progress, reason)
            }
            TerminalKind::Cancelled => tracing::info!(id = event.id, "{} cancelled", event.file_name),
            TerminalKind::Paused { progress } => {
                tracing::info!(id = event.id, "{} paused at {}%", event.file_name, progress)
            }
        }
    }

    fn clear(&self, id: DownloadId) {
        tracing::debug!(id, "notification cleared");
    }
}
