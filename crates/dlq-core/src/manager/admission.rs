//! Admission control: hand QUEUED records to the job substrate while there is headroom.

use anyhow::Result;

use super::{work, DownloadManager, QueueState};
use crate::jobs::{JobSpec, Submission};
use crate::record_store::{DownloadId, DownloadRecord};

impl DownloadManager {
    /// Put a record back in the admission queue (no job yet) and admit.
    pub(super) async fn requeue(&self, state: &mut QueueState, id: DownloadId) -> Result<()> {
        self.store.set_queued(id, None).await?;
        self.admit_queued(state).await
    }

    /// Submit jobs for waiting records, oldest `time_queued` first, until the
    /// parallel limit is reached. Slots are counted per live job, so a job
    /// still probing or unwinding holds its slot too.
    pub(super) async fn admit_queued(&self, state: &mut QueueState) -> Result<()> {
        let limit = self.config.parallel_limit();
        if limit.is_some_and(|l| state.active.len() >= l) {
            return Ok(());
        }
        for record in self.store.queued_in_order().await? {
            if limit.is_some_and(|l| state.active.len() >= l) {
                break;
            }
            if state.active.contains_key(&record.id) {
                continue;
            }
            self.submit_job(state, &record).await?;
        }
        Ok(())
    }

    async fn submit_job(&self, state: &mut QueueState, record: &DownloadRecord) -> Result<()> {
        let job_id = self.next_job_id(record.id);
        // Recorded before submission so the job's first status write cannot be overwritten.
        self.store
            .set_queued(record.id, Some(job_id.as_str()))
            .await?;

        let spec = JobSpec {
            job_id: job_id.clone(),
            download_id: record.id,
            tag: record.tag.clone(),
        };
        let work = work::transfer_job(self.store.clone(), record.id, self.config.clone());
        match self.substrate.submit(spec, work) {
            Submission::Enqueued => {
                tracing::debug!(id = record.id, %job_id, "job submitted");
                state.active.insert(record.id, job_id);
            }
            Submission::KeptExisting(existing) => {
                tracing::debug!(id = record.id, %existing, "job already running, kept");
                self.store
                    .set_queued(record.id, Some(existing.as_str()))
                    .await?;
                state.active.insert(record.id, existing);
            }
        }
        Ok(())
    }
}
