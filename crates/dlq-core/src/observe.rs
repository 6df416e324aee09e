//! Observation layer: live, deduplicated snapshots of download records.
//!
//! Every observation re-runs its query whenever the record store reports a
//! committed mutation and forwards the projection only when it differs from
//! the previous one. Intermediate states may be coalesced; the latest state
//! is always delivered.

use std::collections::HashMap;

use anyhow::Result;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::record_store::{DownloadId, DownloadRecord, RecordQuery, RecordStore, Status};

/// Read-only view of a record with its progress percentage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DownloadModel {
    pub id: DownloadId,
    pub url: String,
    pub path: String,
    pub file_name: String,
    pub tag: String,
    pub headers: HashMap<String, String>,
    pub metadata: String,
    pub status: Status,
    pub total_bytes: u64,
    pub downloaded_bytes: u64,
    /// `floor(downloaded * 100 / total)`, 0 for unknown length.
    pub progress: u8,
    /// Bytes per millisecond.
    pub speed: f32,
    pub etag: String,
    pub time_queued: i64,
    pub last_modified: i64,
    pub failure_reason: String,
}

impl From<DownloadRecord> for DownloadModel {
    fn from(r: DownloadRecord) -> Self {
        let progress = r.progress();
        Self {
            id: r.id,
            url: r.url,
            path: r.path,
            file_name: r.file_name,
            tag: r.tag,
            headers: r.headers,
            metadata: r.metadata,
            status: r.status,
            total_bytes: r.total_bytes,
            downloaded_bytes: r.downloaded_bytes,
            progress,
            speed: r.speed,
            etag: r.etag,
            time_queued: r.time_queued,
            last_modified: r.last_modified,
            failure_reason: r.failure_reason,
        }
    }
}

/// A live sequence of values. Dropping it stops the background query task.
pub struct Observation<T> {
    rx: mpsc::Receiver<T>,
    task: JoinHandle<()>,
}

impl<T> Observation<T> {
    /// Next distinct value; None once the store is gone.
    pub async fn next(&mut self) -> Option<T> {
        self.rx.recv().await
    }
}

impl<T> Drop for Observation<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn models(records: Vec<DownloadRecord>) -> Vec<DownloadModel> {
    records.into_iter().map(DownloadModel::from).collect()
}

fn first_model(records: Vec<DownloadRecord>) -> Option<DownloadModel> {
    records.into_iter().next().map(DownloadModel::from)
}

fn spawn_observation<T, F>(store: RecordStore, query: RecordQuery, project: F) -> Observation<T>
where
    T: PartialEq + Clone + Send + 'static,
    F: Fn(Vec<DownloadRecord>) -> T + Send + 'static,
{
    let (tx, rx) = mpsc::channel(16);
    let mut changes = store.subscribe();
    let task = tokio::spawn(async move {
        let mut last: Option<T> = None;
        loop {
            // Mark the current revision seen before querying, so a commit that
            // lands during the query triggers another round.
            changes.borrow_and_update();
            match store.query(&query).await {
                Ok(records) => {
                    let value = project(records);
                    if last.as_ref() != Some(&value) {
                        if tx.send(value.clone()).await.is_err() {
                            break;
                        }
                        last = Some(value);
                    }
                }
                Err(e) => tracing::warn!(?query, "observation query failed: {:#}", e),
            }
            if changes.changed().await.is_err() {
                break;
            }
        }
    });
    Observation { rx, task }
}

/// Query entry point for consumers.
#[derive(Clone)]
pub struct DownloadObserver {
    store: RecordStore,
}

impl DownloadObserver {
    pub fn new(store: RecordStore) -> Self {
        Self { store }
    }

    fn observe(&self, query: RecordQuery) -> Observation<Vec<DownloadModel>> {
        spawn_observation(self.store.clone(), query, models)
    }

    async fn get(&self, query: RecordQuery) -> Result<Vec<DownloadModel>> {
        Ok(models(self.store.query(&query).await?))
    }

    pub fn observe_all(&self) -> Observation<Vec<DownloadModel>> {
        self.observe(RecordQuery::All)
    }

    /// None while no record exists for `id`.
    pub fn observe_by_id(&self, id: DownloadId) -> Observation<Option<DownloadModel>> {
        spawn_observation(self.store.clone(), RecordQuery::Id(id), first_model)
    }

    pub fn observe_by_tag(&self, tag: impl Into<String>) -> Observation<Vec<DownloadModel>> {
        self.observe(RecordQuery::Tag(tag.into()))
    }

    pub fn observe_by_status(&self, status: Status) -> Observation<Vec<DownloadModel>> {
        self.observe(RecordQuery::Status(status))
    }

    pub fn observe_by_ids(&self, ids: Vec<DownloadId>) -> Observation<Vec<DownloadModel>> {
        self.observe(RecordQuery::Ids(ids))
    }

    pub fn observe_by_tags(&self, tags: Vec<String>) -> Observation<Vec<DownloadModel>> {
        self.observe(RecordQuery::Tags(tags))
    }

    pub fn observe_by_statuses(&self, statuses: Vec<Status>) -> Observation<Vec<DownloadModel>> {
        self.observe(RecordQuery::Statuses(statuses))
    }

    pub async fn get_all(&self) -> Result<Vec<DownloadModel>> {
        self.get(RecordQuery::All).await
    }

    pub async fn get_by_id(&self, id: DownloadId) -> Result<Option<DownloadModel>> {
        Ok(first_model(self.store.query(&RecordQuery::Id(id)).await?))
    }

    pub async fn get_by_tag(&self, tag: impl Into<String>) -> Result<Vec<DownloadModel>> {
        self.get(RecordQuery::Tag(tag.into())).await
    }

    pub async fn get_by_status(&self, status: Status) -> Result<Vec<DownloadModel>> {
        self.get(RecordQuery::Status(status)).await
    }

    pub async fn get_by_ids(&self, ids: Vec<DownloadId>) -> Result<Vec<DownloadModel>> {
        self.get(RecordQuery::Ids(ids)).await
    }

    pub async fn get_by_tags(&self, tags: Vec<String>) -> Result<Vec<DownloadModel>> {
        self.get(RecordQuery::Tags(tags)).await
    }

    pub async fn get_by_statuses(&self, statuses: Vec<Status>) -> Result<Vec<DownloadModel>> {
        self.get(RecordQuery::Statuses(statuses)).await
    }
}
