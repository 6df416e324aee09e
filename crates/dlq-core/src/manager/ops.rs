//! Public queue operations: download, pause, resume, retry, cancel, clear,
//! each with by-tag and all-records variants.

use anyhow::Result;

use super::{DownloadManager, DownloadRequest, QueueState};
use crate::error::{DownloadError, ValidationError};
use crate::notify::{TerminalEvent, TerminalKind};
use crate::record_store::{unix_millis, DownloadId, RecordQuery, Status, UserAction};
use crate::target;

impl DownloadManager {
    /// Start (or re-request) a download and return its stable id.
    ///
    /// Validation happens before anything is touched. Re-requesting a target
    /// that is already queued or running only records the START intent.
    pub async fn download(&self, request: DownloadRequest) -> Result<DownloadId, DownloadError> {
        request.validate()?;
        if self.config.notifications_enabled && !self.notifier.permitted() {
            return Err(ValidationError::NotificationsNotPermitted.into());
        }
        let id = request.id();
        let mut state = self.state.lock().await;

        let Some(existing) = self.store.get(id).await? else {
            // New target: leftovers from an unrelated earlier run must not be resumed.
            target::delete_download_files(&request.path, &request.file_name).await?;
            self.store.insert(&request.to_record(unix_millis())).await?;
            tracing::info!(id, url = %request.url, file = %request.file_name, "download queued");
            self.admit_queued(&mut state).await?;
            return Ok(id);
        };

        self.store.set_user_action(id, UserAction::Start).await?;
        self.store
            .update_request(
                id,
                &request.tag,
                &request.headers,
                &request.metadata,
                request.support_pause_resume,
            )
            .await?;

        if existing.status.is_in_flight() {
            tracing::debug!(id, status = existing.status.as_str(), "already in flight");
            return Ok(id);
        }
        if matches!(existing.status, Status::Success | Status::Cancelled) {
            target::delete_download_files(&existing.path, &existing.file_name).await?;
            self.store.reset_progress(id).await?;
        }
        tracing::info!(id, from = existing.status.as_str(), "download re-queued");
        self.requeue(&mut state, id).await?;
        Ok(id)
    }

    pub async fn pause(&self, id: DownloadId) -> Result<(), DownloadError> {
        let mut state = self.state.lock().await;
        Ok(self.pause_locked(&mut state, id).await?)
    }

    pub async fn pause_by_tag(&self, tag: &str) -> Result<(), DownloadError> {
        self.apply_to(RecordQuery::Tag(tag.to_string()), BulkOp::Pause)
            .await
    }

    pub async fn pause_all(&self) -> Result<(), DownloadError> {
        self.apply_to(RecordQuery::All, BulkOp::Pause).await
    }

    pub async fn resume(&self, id: DownloadId) -> Result<(), DownloadError> {
        let mut state = self.state.lock().await;
        Ok(self.resume_locked(&mut state, id).await?)
    }

    pub async fn resume_by_tag(&self, tag: &str) -> Result<(), DownloadError> {
        self.apply_to(RecordQuery::Tag(tag.to_string()), BulkOp::Resume)
            .await
    }

    pub async fn resume_all(&self) -> Result<(), DownloadError> {
        self.apply_to(RecordQuery::All, BulkOp::Resume).await
    }

    pub async fn retry(&self, id: DownloadId) -> Result<(), DownloadError> {
        let mut state = self.state.lock().await;
        Ok(self.retry_locked(&mut state, id).await?)
    }

    pub async fn retry_by_tag(&self, tag: &str) -> Result<(), DownloadError> {
        self.apply_to(RecordQuery::Tag(tag.to_string()), BulkOp::Retry)
            .await
    }

    pub async fn retry_all(&self) -> Result<(), DownloadError> {
        self.apply_to(RecordQuery::All, BulkOp::Retry).await
    }

    pub async fn cancel(&self, id: DownloadId) -> Result<(), DownloadError> {
        let mut state = self.state.lock().await;
        Ok(self.cancel_locked(&mut state, id).await?)
    }

    pub async fn cancel_by_tag(&self, tag: &str) -> Result<(), DownloadError> {
        self.apply_to(RecordQuery::Tag(tag.to_string()), BulkOp::Cancel)
            .await
    }

    pub async fn cancel_all(&self) -> Result<(), DownloadError> {
        self.apply_to(RecordQuery::All, BulkOp::Cancel).await
    }

    /// Cancel any live job, optionally delete the files, and delete the record.
    pub async fn clear_db(&self, id: DownloadId, delete_file: bool) -> Result<(), DownloadError> {
        let mut state = self.state.lock().await;
        self.clear_locked(&mut state, id, delete_file).await?;
        self.admit_queued(&mut state).await?;
        Ok(())
    }

    pub async fn clear_db_by_tag(&self, tag: &str, delete_file: bool) -> Result<(), DownloadError> {
        self.clear_matching(RecordQuery::Tag(tag.to_string()), delete_file)
            .await
    }

    /// Clear records whose last mutation is at or before `before_ms` (Unix milliseconds).
    pub async fn clear_db_older_than(
        &self,
        before_ms: i64,
        delete_file: bool,
    ) -> Result<(), DownloadError> {
        self.clear_matching(RecordQuery::ModifiedBefore(before_ms), delete_file)
            .await
    }

    pub async fn clear_all_db(&self, delete_file: bool) -> Result<(), DownloadError> {
        self.clear_matching(RecordQuery::All, delete_file).await
    }

    async fn apply_to(&self, query: RecordQuery, op: BulkOp) -> Result<(), DownloadError> {
        let mut state = self.state.lock().await;
        for record in self.store.query(&query).await? {
            let id = record.id;
            match op {
                BulkOp::Pause => self.pause_locked(&mut state, id).await?,
                BulkOp::Resume => self.resume_locked(&mut state, id).await?,
                BulkOp::Retry => self.retry_locked(&mut state, id).await?,
                BulkOp::Cancel => self.cancel_locked(&mut state, id).await?,
            }
        }
        Ok(())
    }

    async fn clear_matching(&self, query: RecordQuery, delete_file: bool) -> Result<(), DownloadError> {
        let mut state = self.state.lock().await;
        for record in self.store.query(&query).await? {
            self.clear_locked(&mut state, record.id, delete_file).await?;
        }
        self.admit_queued(&mut state).await?;
        Ok(())
    }

    async fn pause_locked(&self, state: &mut QueueState, id: DownloadId) -> Result<()> {
        let Some(record) = self.store.get(id).await? else {
            return Ok(());
        };
        if let Some(job) = state.active.get(&id) {
            self.store.set_user_action(id, UserAction::Pause).await?;
            tracing::debug!(id, %job, "pause requested");
            self.substrate.cancel(job);
        } else if record.status.is_in_flight() {
            // Waiting for admission: nothing runs, pause in place.
            self.store.set_user_action(id, UserAction::Pause).await?;
            self.store.set_status(id, Status::Paused).await?;
            let progress = record.progress();
            self.notify(TerminalEvent {
                id,
                file_name: record.file_name,
                kind: TerminalKind::Paused { progress },
            });
        }
        Ok(())
    }

    async fn cancel_locked(&self, state: &mut QueueState, id: DownloadId) -> Result<()> {
        let Some(record) = self.store.get(id).await? else {
            return Ok(());
        };
        if let Some(job) = state.active.get(&id) {
            self.store.set_user_action(id, UserAction::Cancel).await?;
            tracing::debug!(id, %job, "cancel requested");
            self.substrate.cancel(job);
            return Ok(());
        }
        if matches!(record.status, Status::Success | Status::Cancelled) {
            return Ok(());
        }
        // PAUSED, FAILED or waiting for admission: no job to round-trip through.
        self.store.set_user_action(id, UserAction::Cancel).await?;
        self.store.set_status(id, Status::Cancelled).await?;
        target::delete_download_files(&record.path, &record.file_name).await?;
        tracing::info!(id, from = record.status.as_str(), "download cancelled");
        self.notify(TerminalEvent {
            id,
            file_name: record.file_name,
            kind: TerminalKind::Cancelled,
        });
        Ok(())
    }

    async fn resume_locked(&self, state: &mut QueueState, id: DownloadId) -> Result<()> {
        self.restart_locked(state, id, UserAction::Resume, Status::Paused)
            .await
    }

    async fn retry_locked(&self, state: &mut QueueState, id: DownloadId) -> Result<()> {
        self.restart_locked(state, id, UserAction::Retry, Status::Failed)
            .await
    }

    /// Shared by resume and retry. `from` is the status the action is meant
    /// for; CANCELLED is accepted by both and starts from zero.
    async fn restart_locked(
        &self,
        state: &mut QueueState,
        id: DownloadId,
        action: UserAction,
        from: Status,
    ) -> Result<()> {
        let Some(record) = self.store.get(id).await? else {
            return Ok(());
        };
        if record.status.is_in_flight() {
            // Only matters while a pause/cancel is unwinding: keep it running.
            self.store.set_user_action(id, action).await?;
            return Ok(());
        }
        if record.status != from && record.status != Status::Cancelled {
            tracing::debug!(id, status = record.status.as_str(), ?action, "nothing to do");
            return Ok(());
        }
        self.store.set_user_action(id, action).await?;
        if record.status == Status::Cancelled {
            self.store.reset_progress(id).await?;
        }
        tracing::info!(id, ?action, from = record.status.as_str(), "download re-queued");
        self.requeue(state, id).await
    }

    async fn clear_locked(&self, state: &mut QueueState, id: DownloadId, delete_file: bool) -> Result<()> {
        let Some(record) = self.store.get(id).await? else {
            return Ok(());
        };
        if let Some(job) = state.active.remove(&id) {
            self.substrate.cancel(&job);
        }
        self.store.remove(id).await?;
        if delete_file {
            target::delete_download_files(&record.path, &record.file_name).await?;
        }
        self.notifier.clear(id);
        tracing::info!(id, delete_file, "download cleared");
        Ok(())
    }
}

/// Id-scoped operations that have tag and all-records variants.
#[derive(Debug, Clone, Copy)]
enum BulkOp {
    Pause,
    Resume,
    Retry,
    Cancel,
}
