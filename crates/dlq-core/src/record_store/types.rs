//! Types stored in the download record table.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Stable download identifier, derived from (url, path, file name).
pub type DownloadId = i64;

/// Download lifecycle state stored as a string in the database.
///
/// `Default → Queued → Started → Progress → {Success | Failed | Cancelled | Paused}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Default,
    Queued,
    Started,
    Progress,
    Success,
    Cancelled,
    Failed,
    Paused,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Default => "default",
            Status::Queued => "queued",
            Status::Started => "started",
            Status::Progress => "progress",
            Status::Success => "success",
            Status::Cancelled => "cancelled",
            Status::Failed => "failed",
            Status::Paused => "paused",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "queued" => Status::Queued,
            "started" => Status::Started,
            "progress" => Status::Progress,
            "success" => Status::Success,
            "cancelled" => Status::Cancelled,
            "failed" => Status::Failed,
            "paused" => Status::Paused,
            _ => Status::Default,
        }
    }

    /// Bytes are (or are about to be) moving: a job exists or is waiting for admission.
    pub fn is_in_flight(self) -> bool {
        matches!(self, Status::Queued | Status::Started | Status::Progress)
    }
}

/// Last intent expressed by the caller. Read by the terminal-state handler to
/// tell a pause from a cancel, since the job substrate reports both as "cancelled".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UserAction {
    Start,
    Pause,
    Resume,
    Retry,
    Cancel,
    None,
}

impl UserAction {
    pub fn as_str(self) -> &'static str {
        match self {
            UserAction::Start => "start",
            UserAction::Pause => "pause",
            UserAction::Resume => "resume",
            UserAction::Retry => "retry",
            UserAction::Cancel => "cancel",
            UserAction::None => "none",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "start" => UserAction::Start,
            "pause" => UserAction::Pause,
            "resume" => UserAction::Resume,
            "retry" => UserAction::Retry,
            "cancel" => UserAction::Cancel,
            _ => UserAction::None,
        }
    }

    /// START, RESUME and RETRY all mean "the caller wants this running".
    pub fn wants_running(self) -> bool {
        matches!(self, UserAction::Start | UserAction::Resume | UserAction::Retry)
    }
}

/// One row per logical download target.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadRecord {
    pub id: DownloadId,
    pub url: String,
    pub path: String,
    pub file_name: String,
    pub tag: String,
    pub headers: HashMap<String, String>,
    pub metadata: String,
    pub status: Status,
    pub user_action: UserAction,
    /// 0 = unknown length.
    pub total_bytes: u64,
    pub downloaded_bytes: u64,
    /// Most recent sampled rate in bytes per millisecond.
    pub speed: f32,
    pub etag: String,
    /// Identity of the job last submitted for this record; None while waiting for admission.
    pub job_id: Option<String>,
    pub support_pause_resume: bool,
    /// Unix milliseconds of first enqueue.
    pub time_queued: i64,
    /// Unix milliseconds of the last mutation.
    pub last_modified: i64,
    pub failure_reason: String,
}

impl DownloadRecord {
    /// `floor(downloaded * 100 / total)`, 0 when the length is unknown.
    pub fn progress(&self) -> u8 {
        progress_percent(self.downloaded_bytes, self.total_bytes)
    }
}

pub fn progress_percent(downloaded: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = (u128::from(downloaded) * 100 / u128::from(total)).min(100);
    pct as u8
}

/// Query shapes served by the store and the observation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordQuery {
    All,
    Id(DownloadId),
    Ids(Vec<DownloadId>),
    Tag(String),
    Tags(Vec<String>),
    Status(Status),
    Statuses(Vec<Status>),
    /// `last_modified <= ms`.
    ModifiedBefore(i64),
}
