//! Caller-facing download request.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::record_store::{DownloadId, DownloadRecord, Status, UserAction};
use crate::target;

/// What to download and where. Only url, path and file name identify the target;
/// everything else is refreshed on every re-request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequest {
    pub url: String,
    /// Directory the file is saved in.
    pub path: String,
    pub file_name: String,
    pub tag: String,
    pub headers: HashMap<String, String>,
    pub metadata: String,
    pub support_pause_resume: bool,
}

impl DownloadRequest {
    pub fn new(url: impl Into<String>, path: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            path: path.into(),
            file_name: file_name.into(),
            tag: String::new(),
            headers: HashMap::new(),
            metadata: String::new(),
            support_pause_resume: true,
        }
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    pub fn metadata(mut self, metadata: impl Into<String>) -> Self {
        self.metadata = metadata.into();
        self
    }

    pub fn support_pause_resume(mut self, supported: bool) -> Self {
        self.support_pause_resume = supported;
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.url.trim().is_empty() {
            return Err(ValidationError::EmptyUrl);
        }
        if self.path.trim().is_empty() {
            return Err(ValidationError::EmptyPath);
        }
        if self.file_name.trim().is_empty() {
            return Err(ValidationError::EmptyFileName);
        }
        Ok(())
    }

    pub fn id(&self) -> DownloadId {
        target::download_id(&self.url, &self.path, &self.file_name)
    }

    /// Fresh QUEUED record for a target seen for the first time.
    pub(crate) fn to_record(&self, now_ms: i64) -> DownloadRecord {
        DownloadRecord {
            id: self.id(),
            url: self.url.clone(),
            path: self.path.clone(),
            file_name: self.file_name.clone(),
            tag: self.tag.clone(),
            headers: self.headers.clone(),
            metadata: self.metadata.clone(),
            status: Status::Queued,
            user_action: UserAction::Start,
            total_bytes: 0,
            downloaded_bytes: 0,
            speed: 0.0,
            etag: String::new(),
            job_id: None,
            support_pause_resume: self.support_pause_resume,
            time_queued: now_ms,
            last_modified: now_ms,
            failure_reason: String::new(),
        }
    }
}
