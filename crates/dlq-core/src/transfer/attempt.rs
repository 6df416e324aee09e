//! One GET against the server: response validation, streaming into the
//! partial file, progress sampling.

use std::cell::RefCell;
use std::time::{Duration, Instant};

use curl::easy::Easy;
use tokio::sync::mpsc;

use super::sampler::ProgressSampler;
use super::types::{TransferError, TransferEvent, TransferOutcome, TransferRequest};
use crate::control::AbortToken;
use crate::fetch_head;
use crate::storage::PartialFile;

pub(super) enum AttemptEnd {
    Finished(TransferOutcome),
    /// Ranged request answered with 416 or a redirect; start over without range.
    RangeRejected(String),
}

enum Stop {
    Cancelled,
    Rejected(String),
    Failed(TransferError),
}

struct Accepted {
    total_bytes: u64,
    sampler: ProgressSampler,
}

/// State shared by the header and write callbacks.
struct Sink<'a> {
    part: &'a mut PartialFile,
    events: &'a mpsc::Sender<TransferEvent>,
    ranged: bool,
    support_pause_resume: bool,
    interval: Duration,
    header_lines: Vec<String>,
    status: u32,
    redirected: bool,
    accepted: Option<Accepted>,
    stop: Option<Stop>,
}

fn emit(events: &mpsc::Sender<TransferEvent>, event: TransferEvent) {
    // Receiver gone means nobody persists progress any more; the transfer itself carries on.
    let _ = events.blocking_send(event);
}

fn status_code(line: &str) -> Option<u32> {
    line.split_whitespace().nth(1)?.parse().ok()
}

impl Sink<'_> {
    fn on_header(&mut self, line: String) {
        if line.starts_with("HTTP/") {
            if let Some(code) = status_code(&line) {
                if (300..400).contains(&code) {
                    self.redirected = true;
                }
                self.status = code;
            }
        }
        self.header_lines.push(line);
    }

    /// Decide whether the final response may be written to disk. Runs once,
    /// before the first body byte (or after perform for empty bodies).
    fn accept(&mut self) -> Result<(), Stop> {
        let code = self.status;
        if self.ranged && code == 416 {
            return Err(Stop::Rejected("HTTP 416 range not satisfiable".to_string()));
        }
        if self.ranged && self.redirected {
            return Err(Stop::Rejected(format!("resume redirected (final HTTP {code})")));
        }
        if !(200..300).contains(&code) {
            return Err(Stop::Failed(TransferError::Http(code)));
        }
        if code == 204 {
            return Err(Stop::Failed(TransferError::MissingBody(code)));
        }
        if self.ranged && code != 206 {
            tracing::warn!(code, "server ignored range request, rewriting from offset 0");
            self.part
                .restart()
                .map_err(|e| Stop::Failed(TransferError::Io(e)))?;
        }

        let head = fetch_head::parse_headers(&self.header_lines);
        let offset = self.part.written();
        let total_bytes = match head.content_length {
            Some(len) if self.support_pause_resume => len + offset,
            _ => 0,
        };
        emit(self.events, TransferEvent::Started { total_bytes });
        self.accepted = Some(Accepted {
            total_bytes,
            sampler: ProgressSampler::new(self.interval, Instant::now()),
        });
        Ok(())
    }

    fn on_body(&mut self, data: &[u8], abort: &AbortToken) -> usize {
        if self.stop.is_some() {
            return 0;
        }
        if abort.is_aborted() {
            self.stop = Some(Stop::Cancelled);
            return 0;
        }
        if self.accepted.is_none() {
            if let Err(stop) = self.accept() {
                self.stop = Some(stop);
                return 0;
            }
        }
        if let Err(e) = self.part.write_chunk(data) {
            self.stop = Some(Stop::Failed(TransferError::Io(e)));
            return 0;
        }
        let downloaded_bytes = self.part.written();
        if let Some(acc) = self.accepted.as_mut() {
            if let Some(speed) = acc.sampler.record(data.len() as u64, Instant::now()) {
                emit(
                    self.events,
                    TransferEvent::Progress {
                        downloaded_bytes,
                        total_bytes: acc.total_bytes,
                        speed,
                    },
                );
            }
        }
        data.len()
    }
}

fn stop_to_end(stop: Stop, part: &PartialFile) -> Result<AttemptEnd, TransferError> {
    match stop {
        Stop::Cancelled => Ok(AttemptEnd::Finished(TransferOutcome::Cancelled {
            downloaded_bytes: part.written(),
        })),
        Stop::Rejected(reason) => Ok(AttemptEnd::RangeRejected(reason)),
        Stop::Failed(e) => Err(e),
    }
}

/// Run one request. `part` is positioned at the resume offset; a non-zero
/// offset makes this a ranged request.
pub(super) fn run(
    req: &TransferRequest,
    part: &mut PartialFile,
    events: &mpsc::Sender<TransferEvent>,
    abort: &AbortToken,
) -> Result<AttemptEnd, TransferError> {
    let offset = part.written();
    let ranged = offset > 0;

    let mut easy = Easy::new();
    easy.url(&req.url)?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    easy.connect_timeout(req.connect_timeout)?;
    easy.low_speed_limit(1)?;
    easy.low_speed_time(req.read_timeout)?;
    easy.progress(true)?;
    if ranged {
        easy.range(&format!("{}-", offset))?;
    }
    if !req.headers.is_empty() {
        easy.http_headers(fetch_head::header_list(&req.headers)?)?;
    }

    let sink = RefCell::new(Sink {
        part,
        events,
        ranged,
        support_pause_resume: req.support_pause_resume,
        interval: req.progress_interval,
        header_lines: Vec::new(),
        status: 0,
        redirected: false,
        accepted: None,
        stop: None,
    });

    let performed = {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            let line = String::from_utf8_lossy(data).trim_end().to_string();
            sink.borrow_mut().on_header(line);
            true
        })?;
        transfer.write_function(|data| Ok(sink.borrow_mut().on_body(data, abort)))?;
        // Lets a stalled read notice the abort token too.
        transfer.progress_function(|_, _, _, _| !abort.is_aborted())?;
        transfer.perform()
    };

    let mut sink = sink.into_inner();
    if let Some(stop) = sink.stop.take() {
        return stop_to_end(stop, sink.part);
    }
    if abort.is_aborted() {
        return stop_to_end(Stop::Cancelled, sink.part);
    }
    performed?;

    if sink.accepted.is_none() {
        if let Err(stop) = sink.accept() {
            return stop_to_end(stop, sink.part);
        }
    }

    let downloaded_bytes = sink.part.written();
    let (total_bytes, speed) = match sink.accepted.as_mut() {
        Some(acc) => (acc.total_bytes, acc.sampler.finish(Instant::now())),
        None => (0, 0.0),
    };
    emit(
        sink.events,
        TransferEvent::Progress {
            downloaded_bytes,
            total_bytes,
            speed,
        },
    );

    Ok(AttemptEnd::Finished(TransferOutcome::Completed {
        total_bytes: if total_bytes == 0 {
            downloaded_bytes
        } else {
            total_bytes
        },
        downloaded_bytes,
    }))
}
