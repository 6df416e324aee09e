//! Job event loop and terminal-state handling.

use std::sync::Weak;

use anyhow::Result;
use tokio::sync::broadcast::{self, error::RecvError};

use super::{DownloadManager, QueueState};
use crate::jobs::{JobEvent, JobId, JobState};
use crate::notify::{TerminalEvent, TerminalKind};
use crate::record_store::{DownloadId, Status, UserAction};
use crate::target;

/// Follow the substrate's event stream for as long as the manager is alive.
pub(super) async fn run_event_loop(
    manager: Weak<DownloadManager>,
    mut events: broadcast::Receiver<JobEvent>,
) {
    loop {
        let received = events.recv().await;
        let Some(manager) = manager.upgrade() else {
            break;
        };
        match received {
            Ok(event) if event.state.is_terminal() => manager.on_terminal(event).await,
            Ok(event) => {
                tracing::trace!(job_id = %event.job_id, id = event.download_id, state = ?event.state, "job event");
            }
            Err(RecvError::Lagged(missed)) => {
                tracing::warn!(missed, "job event stream lagged, reconciling slots");
                manager.reconcile().await;
            }
            Err(RecvError::Closed) => break,
        }
    }
    tracing::debug!("job event loop stopped");
}

impl DownloadManager {
    async fn on_terminal(&self, event: JobEvent) {
        let mut state = self.state.lock().await;
        let JobEvent {
            job_id,
            download_id,
            state: job_state,
        } = event;
        if let Err(e) = self
            .finish_job(&mut state, download_id, &job_id, job_state)
            .await
        {
            tracing::warn!(id = download_id, %job_id, "terminal handling failed: {:#}", e);
        }
        if let Err(e) = self.admit_queued(&mut state).await {
            tracing::warn!("admission after terminal event failed: {:#}", e);
        }
    }

    /// Release the slot and move the record to its post-job status.
    async fn finish_job(
        &self,
        state: &mut QueueState,
        id: DownloadId,
        job_id: &JobId,
        job_state: JobState,
    ) -> Result<()> {
        if state.active.get(&id) != Some(job_id) {
            tracing::debug!(id, %job_id, "stale job event ignored");
            return Ok(());
        }
        state.active.remove(&id);

        let Some(record) = self.store.get(id).await? else {
            return Ok(());
        };
        if record.job_id.as_deref() != Some(job_id.as_str()) {
            tracing::debug!(id, %job_id, "record moved on to another job");
            return Ok(());
        }

        match job_state {
            JobState::Succeeded(progress) => {
                self.store
                    .mark_success(id, progress.downloaded_bytes, progress.total_bytes)
                    .await?;
                tracing::info!(id, file = %record.file_name, "download succeeded");
                self.notify(TerminalEvent {
                    id,
                    file_name: record.file_name,
                    kind: TerminalKind::Success {
                        total_bytes: progress.total_bytes,
                    },
                });
            }
            JobState::Failed { reason } => {
                self.store.mark_failed(id, &reason).await?;
                tracing::warn!(id, file = %record.file_name, "download failed: {}", reason);
                let progress = record.progress();
                self.notify(TerminalEvent {
                    id,
                    file_name: record.file_name,
                    kind: TerminalKind::Failed { reason, progress },
                });
            }
            JobState::Cancelled => match record.user_action {
                UserAction::Pause => {
                    self.store.set_status(id, Status::Paused).await?;
                    tracing::info!(id, file = %record.file_name, "download paused");
                    let progress = record.progress();
                    self.notify(TerminalEvent {
                        id,
                        file_name: record.file_name,
                        kind: TerminalKind::Paused { progress },
                    });
                }
                action if action.wants_running() => {
                    tracing::debug!(id, ?action, "re-requested while unwinding, queueing again");
                    self.store.set_queued(id, None).await?;
                }
                _ => {
                    self.store.set_status(id, Status::Cancelled).await?;
                    target::delete_download_files(&record.path, &record.file_name).await?;
                    tracing::info!(id, file = %record.file_name, "download cancelled");
                    self.notify(TerminalEvent {
                        id,
                        file_name: record.file_name,
                        kind: TerminalKind::Cancelled,
                    });
                }
            },
            JobState::Enqueued | JobState::Running(_) => {}
        }
        Ok(())
    }

    /// After lost events: any slot whose job is gone is finished as a cancellation,
    /// which the user action then resolves.
    async fn reconcile(&self) {
        let mut state = self.state.lock().await;
        let gone: Vec<(DownloadId, JobId)> = state
            .active
            .iter()
            .filter(|(_, job)| !self.substrate.is_active(job))
            .map(|(id, job)| (*id, job.clone()))
            .collect();
        for (id, job) in gone {
            if let Err(e) = self
                .finish_job(&mut state, id, &job, JobState::Cancelled)
                .await
            {
                tracing::warn!(id, %job, "reconcile failed: {:#}", e);
            }
        }
        if let Err(e) = self.admit_queued(&mut state).await {
            tracing::warn!("admission after reconcile failed: {:#}", e);
        }
    }
}
