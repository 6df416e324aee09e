//! Transfer executor: one resumable HTTP GET for one download.
//!
//! Resumes from the length of `<file>.part` with a `Range: bytes=N-` request,
//! falls back to a single from-scratch retry when the server rejects the
//! range (416) or redirects it, streams the body into the partial file and
//! renames it into place on success. Progress and lifecycle callbacks are
//! sent as [`TransferEvent`]s; cancellation is polled from an [`AbortToken`].

mod attempt;
mod sampler;
mod types;

pub use types::{TransferError, TransferEvent, TransferOutcome, TransferRequest};

use tokio::sync::mpsc;

use crate::control::AbortToken;
use crate::fetch_head;
use crate::storage::{self, PartialFile};
use attempt::AttemptEnd;

/// Run the transfer on the current thread. Blocks; use [`download_async`] from async code.
pub fn download(
    req: &TransferRequest,
    events: &mpsc::Sender<TransferEvent>,
    abort: &AbortToken,
) -> Result<TransferOutcome, TransferError> {
    let final_path = req.final_path();
    let temp_path = req.temp_path();

    let mut offset = if req.support_pause_resume {
        storage::partial_len(&temp_path)
    } else {
        0
    };
    let mut restarted = false;

    loop {
        if abort.is_aborted() {
            return Ok(TransferOutcome::Cancelled {
                downloaded_bytes: storage::partial_len(&temp_path),
            });
        }

        let mut part = PartialFile::open(&temp_path, offset).map_err(TransferError::Storage)?;
        tracing::debug!(url = %req.url, offset, "transfer attempt");

        match attempt::run(req, &mut part, events, abort)? {
            AttemptEnd::Finished(TransferOutcome::Completed {
                total_bytes,
                downloaded_bytes,
            }) => {
                part.sync().map_err(TransferError::Storage)?;
                drop(part);
                storage::finalize(&temp_path, &final_path).map_err(TransferError::Finalize)?;
                tracing::info!(
                    "downloaded {} ({} bytes)",
                    final_path.display(),
                    downloaded_bytes
                );
                return Ok(TransferOutcome::Completed {
                    total_bytes,
                    downloaded_bytes,
                });
            }
            AttemptEnd::Finished(outcome) => return Ok(outcome),
            AttemptEnd::RangeRejected(reason) if !restarted => {
                tracing::warn!(url = %req.url, offset, "resume rejected ({}), restarting from 0", reason);
                drop(part);
                storage::discard_partial(&temp_path)?;
                // Content may have moved on as well; re-check the validator before starting over.
                let etag = fetch_head::probe(
                    &req.url,
                    &req.headers,
                    req.connect_timeout,
                    req.read_timeout,
                )
                .map(|head| head.etag_or_empty().to_string())
                .map_err(|e| tracing::warn!("re-probe after rejected resume failed: {:#}", e))
                .ok();
                let _ = events.blocking_send(TransferEvent::Restarted { etag });
                offset = 0;
                restarted = true;
            }
            AttemptEnd::RangeRejected(reason) => return Err(TransferError::ResumeRejected(reason)),
        }
    }
}

/// [`download`] on the blocking pool.
pub async fn download_async(
    req: TransferRequest,
    events: mpsc::Sender<TransferEvent>,
    abort: AbortToken,
) -> Result<TransferOutcome, TransferError> {
    tokio::task::spawn_blocking(move || download(&req, &events, &abort))
        .await
        .map_err(|e| TransferError::Join(e.to_string()))?
}
