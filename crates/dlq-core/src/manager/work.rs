//! The unit of work submitted for one download: content check, transfer,
//! and persistence of every transfer callback in order.

use tokio::sync::mpsc;

use crate::config::DlqConfig;
use crate::fetch_head;
use crate::jobs::{job_work, JobContext, JobProgress, JobResult, JobWork};
use crate::record_store::{DownloadId, RecordStore};
use crate::safe_resume::{self, ContentCheck};
use crate::storage;
use crate::transfer::{self, TransferEvent, TransferOutcome, TransferRequest};

const EVENT_BUFFER: usize = 64;

pub(super) fn transfer_job(store: RecordStore, id: DownloadId, config: DlqConfig) -> JobWork {
    job_work(move |ctx| run(store, id, config, ctx))
}

async fn run(store: RecordStore, id: DownloadId, config: DlqConfig, ctx: JobContext) -> JobResult {
    // Re-read: headers and flags may have been refreshed since submission.
    let record = match store.get(id).await {
        Ok(Some(record)) => record,
        Ok(None) => return JobResult::Failed("download record no longer exists".to_string()),
        Err(e) => return JobResult::Failed(format!("{:#}", e)),
    };
    if ctx.is_cancelled() {
        return JobResult::Cancelled;
    }

    let req = TransferRequest {
        url: record.url.clone(),
        path: record.path.clone(),
        file_name: record.file_name.clone(),
        headers: record.headers.clone(),
        support_pause_resume: record.support_pause_resume,
        connect_timeout: config.connect_timeout(),
        read_timeout: config.read_timeout(),
        progress_interval: config.progress_interval(),
    };

    let probe = fetch_head::probe_async(
        req.url.clone(),
        req.headers.clone(),
        req.connect_timeout,
        req.read_timeout,
    )
    .await;
    if let ContentCheck::Changed { latest } = safe_resume::check_content(&record.etag, &probe) {
        tracing::info!(
            id,
            old = %record.etag,
            new = %latest,
            "remote content changed, discarding partial file"
        );
        if let Err(e) = storage::discard_partial(&req.temp_path()) {
            return JobResult::Failed(format!("discard stale partial file: {}", e));
        }
        if let Err(e) = store.reset_progress(id).await {
            tracing::warn!(id, "reset progress failed: {:#}", e);
        }
        if let Err(e) = store.set_etag(id, &latest).await {
            tracing::warn!(id, "persist etag failed: {:#}", e);
        }
    }

    let (tx, mut rx) = mpsc::channel(EVENT_BUFFER);
    let persist = async {
        while let Some(event) = rx.recv().await {
            apply_event(&store, id, &ctx, event).await;
        }
    };
    let (outcome, ()) = tokio::join!(
        transfer::download_async(req, tx, ctx.abort_token()),
        persist
    );

    match outcome {
        Ok(TransferOutcome::Completed {
            total_bytes,
            downloaded_bytes,
        }) => JobResult::Succeeded(JobProgress {
            downloaded_bytes,
            total_bytes,
            speed: 0.0,
        }),
        Ok(TransferOutcome::Cancelled { downloaded_bytes }) => {
            tracing::debug!(id, downloaded_bytes, "transfer unwound");
            JobResult::Cancelled
        }
        Err(e) => JobResult::Failed(e.to_string()),
    }
}

/// Persist one transfer callback. Store failures are logged; the transfer keeps going.
async fn apply_event(store: &RecordStore, id: DownloadId, ctx: &JobContext, event: TransferEvent) {
    let res = match event {
        TransferEvent::Started { total_bytes } => {
            tracing::debug!(id, total_bytes, "transfer started");
            store.mark_started(id, total_bytes).await
        }
        TransferEvent::Progress {
            downloaded_bytes,
            total_bytes,
            speed,
        } => {
            ctx.report(JobProgress {
                downloaded_bytes,
                total_bytes,
                speed,
            });
            store
                .update_progress(id, downloaded_bytes, total_bytes, speed)
                .await
        }
        TransferEvent::Restarted { etag } => {
            let reset = store.reset_progress(id).await;
            match etag {
                Some(etag) if reset.is_ok() => store.set_etag(id, &etag).await,
                _ => reset,
            }
        }
    };
    if let Err(e) = res {
        tracing::warn!(id, "durable progress update failed: {:#}", e);
    }
}
