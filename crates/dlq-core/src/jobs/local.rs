//! In-process job runner: every job is a tokio task.
//!
//! Jobs do not survive the process; the record store's restart recovery
//! re-queues whatever was in flight.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::broadcast;

use super::{
    JobContext, JobEvent, JobId, JobResult, JobSpec, JobState, JobSubstrate, JobWork, Submission,
};
use crate::control::JobControl;

const EVENT_CAPACITY: usize = 1024;

pub struct LocalJobRunner {
    control: Arc<JobControl>,
    events: broadcast::Sender<JobEvent>,
    handle: Handle,
}

impl LocalJobRunner {
    /// Must be called inside a tokio runtime; jobs are spawned onto it.
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            control: Arc::new(JobControl::new()),
            events,
            handle: Handle::current(),
        }
    }
}

impl JobSubstrate for LocalJobRunner {
    fn submit(&self, spec: JobSpec, work: JobWork) -> Submission {
        let JobSpec {
            job_id,
            download_id,
            tag,
        } = spec;

        let token = match self.control.try_register(download_id, &job_id) {
            Ok(token) => token,
            Err(existing) => {
                tracing::debug!(%existing, %job_id, "job already running, keeping it");
                return Submission::KeptExisting(existing);
            }
        };

        let _ = self.events.send(JobEvent {
            job_id: job_id.clone(),
            download_id,
            state: JobState::Enqueued,
        });
        tracing::debug!(%job_id, download_id, tag = %tag, "job enqueued");

        let events = self.events.clone();
        let control = Arc::clone(&self.control);
        let handle = self.handle.clone();
        self.handle.spawn(async move {
            let _ = events.send(JobEvent {
                job_id: job_id.clone(),
                download_id,
                state: JobState::Running(Default::default()),
            });

            let ctx = JobContext::new(job_id.clone(), download_id, token.clone(), events.clone());
            let result = match handle.spawn(work(ctx)).await {
                Ok(result) => result,
                Err(e) => JobResult::Failed(format!("job task failed: {}", e)),
            };

            control.unregister(download_id, &job_id);

            let state = match result {
                JobResult::Succeeded(progress) => JobState::Succeeded(progress),
                _ if token.is_aborted() => JobState::Cancelled,
                JobResult::Failed(reason) => JobState::Failed { reason },
                JobResult::Cancelled => JobState::Cancelled,
            };
            tracing::debug!(%job_id, download_id, ?state, "job finished");
            let _ = events.send(JobEvent {
                job_id,
                download_id,
                state,
            });
        });

        Submission::Enqueued
    }

    fn cancel(&self, job_id: &JobId) {
        if !self.control.request_abort(job_id) {
            tracing::debug!(%job_id, "cancel for unknown job ignored");
        }
    }

    fn is_active(&self, job_id: &JobId) -> bool {
        self.control.is_registered(job_id)
    }

    fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }
}
