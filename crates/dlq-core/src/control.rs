//! Job control for pause/cancel: shared abort tokens.
//!
//! Each running job is registered under its download id with an abort token.
//! Cancelling a job sets the token; the transfer loop checks it between chunks
//! and unwinds with a cancelled outcome.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::jobs::JobId;
use crate::record_store::DownloadId;

/// Cooperative cancellation flag shared between a job and whoever may cancel it.
#[derive(Debug, Clone, Default)]
pub struct AbortToken(Arc<AtomicBool>);

impl AbortToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Shared registry of download id -> (job id, abort token). At most one live
/// job per download id.
#[derive(Default)]
pub struct JobControl {
    jobs: RwLock<HashMap<DownloadId, (JobId, AbortToken)>>,
}

impl JobControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job for `download_id` and return its abort token, or the id of
    /// the job already registered for that download.
    pub fn try_register(&self, download_id: DownloadId, job_id: &JobId) -> Result<AbortToken, JobId> {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        if let Some((existing, _)) = jobs.get(&download_id) {
            return Err(existing.clone());
        }
        let token = AbortToken::new();
        jobs.insert(download_id, (job_id.clone(), token.clone()));
        Ok(token)
    }

    /// Unregister a finished job. A newer job registered for the same download is left alone.
    pub fn unregister(&self, download_id: DownloadId, job_id: &JobId) {
        let mut jobs = self.jobs.write().unwrap_or_else(PoisonError::into_inner);
        if jobs.get(&download_id).is_some_and(|(j, _)| j == job_id) {
            jobs.remove(&download_id);
        }
    }

    /// Request abort for a job. Returns false when no such job is registered.
    pub fn request_abort(&self, job_id: &JobId) -> bool {
        let jobs = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
        match jobs.values().find(|(j, _)| j == job_id) {
            Some((_, token)) => {
                token.abort();
                true
            }
            None => false,
        }
    }

    /// Whether `job_id` is the live job of some download.
    pub fn is_registered(&self, job_id: &JobId) -> bool {
        let jobs = self.jobs.read().unwrap_or_else(PoisonError::into_inner);
        jobs.values().any(|(j, _)| j == job_id)
    }

}
