//! Job execution substrate.
//!
//! The manager never runs transfers itself: it hands a unit of work to a
//! [`JobSubstrate`] under a uniqueness key (the download id) and learns about
//! the job's life through a broadcast stream of [`JobEvent`]s. Cancellation
//! is cooperative through the job's abort token.

mod local;

pub use local::LocalJobRunner;

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use tokio::sync::broadcast;

use crate::control::AbortToken;
use crate::record_store::DownloadId;

/// Identity of one submitted job: `<download id hex>-<sequence hex>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId(String);

impl JobId {
    pub fn new(download_id: DownloadId, seq: u64) -> Self {
        Self(format!("{:x}-{:x}", download_id, seq))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub job_id: JobId,
    /// Uniqueness key.
    pub download_id: DownloadId,
    pub tag: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    Enqueued,
    /// A job was already running for the download; it is kept.
    KeptExisting(JobId),
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct JobProgress {
    pub downloaded_bytes: u64,
    pub total_bytes: u64,
    pub speed: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    Enqueued,
    Running(JobProgress),
    Succeeded(JobProgress),
    Failed { reason: String },
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Succeeded(_) | JobState::Failed { .. } | JobState::Cancelled
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobEvent {
    pub job_id: JobId,
    pub download_id: DownloadId,
    pub state: JobState,
}

/// Value a unit of work resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum JobResult {
    Succeeded(JobProgress),
    Failed(String),
    Cancelled,
}

/// Handed to a running unit of work.
pub struct JobContext {
    pub job_id: JobId,
    pub download_id: DownloadId,
    abort: AbortToken,
    events: broadcast::Sender<JobEvent>,
}

impl JobContext {
    pub(crate) fn new(
        job_id: JobId,
        download_id: DownloadId,
        abort: AbortToken,
        events: broadcast::Sender<JobEvent>,
    ) -> Self {
        Self {
            job_id,
            download_id,
            abort,
            events,
        }
    }

    /// Token set when the job is cancelled.
    pub fn abort_token(&self) -> AbortToken {
        self.abort.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.abort.is_aborted()
    }

    /// Publish a RUNNING event with a progress payload.
    pub fn report(&self, progress: JobProgress) {
        let _ = self.events.send(JobEvent {
            job_id: self.job_id.clone(),
            download_id: self.download_id,
            state: JobState::Running(progress),
        });
    }
}

pub type JobFuture = Pin<Box<dyn Future<Output = JobResult> + Send>>;

/// One unit of work.
pub type JobWork = Box<dyn FnOnce(JobContext) -> JobFuture + Send>;

/// Box an async closure into a [`JobWork`].
pub fn job_work<F, Fut>(f: F) -> JobWork
where
    F: FnOnce(JobContext) -> Fut + Send + 'static,
    Fut: Future<Output = JobResult> + Send + 'static,
{
    Box::new(move |ctx| Box::pin(f(ctx)) as JobFuture)
}

/// Where jobs run. Implementations must emit exactly one terminal event per
/// enqueued job, after the job stopped touching its files.
pub trait JobSubstrate: Send + Sync {
    /// Run `work` unless a job for the same download id is still alive, in
    /// which case the running job is kept and `work` is dropped.
    fn submit(&self, spec: JobSpec, work: JobWork) -> Submission;

    /// Cooperative cancellation request. Unknown or finished jobs are ignored.
    fn cancel(&self, job_id: &JobId);

    /// Whether `job_id` is still alive.
    fn is_active(&self, job_id: &JobId) -> bool;

    fn subscribe(&self) -> broadcast::Receiver<JobEvent>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_id_format() {
        assert_eq!(JobId::new(255, 16).as_str(), "ff-10");
        assert_eq!(JobId::new(1, 1).to_string(), "1-1");
    }

    #[test]
    fn terminal_states() {
        assert!(!JobState::Enqueued.is_terminal());
        assert!(!JobState::Running(JobProgress::default()).is_terminal());
        assert!(JobState::Cancelled.is_terminal());
        assert!(JobState::Failed { reason: "x".into() }.is_terminal());
    }
}
