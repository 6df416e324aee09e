//! Download queue manager.
//!
//! Owns admission control and every record lifecycle transition. Public
//! operations and job-terminal events are serialized through one async mutex
//! around the queue state, so a `download()` racing a `cancel()` for the same
//! id always sees a consistent record.
//!
//! Pause and cancel both reach a running job as a plain cancellation. The
//! user action recorded just before the cancel request decides, in the
//! terminal handler, whether the record ends PAUSED (file kept), CANCELLED
//! (file deleted) or goes back to QUEUED (re-requested while unwinding).

mod admission;
mod events;
mod ops;
mod request;
mod work;

pub use request::DownloadRequest;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError};

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::config::DlqConfig;
use crate::engine_lock::EngineLock;
use crate::error::{DownloadError, ValidationError};
use crate::jobs::{JobId, JobSubstrate};
use crate::notify::{NotificationSink, TerminalEvent};
use crate::observe::DownloadObserver;
use crate::record_store::{DownloadId, DownloadRecord, RecordStore};
use crate::target;

/// Mutable queue state guarded by the manager's lock.
#[derive(Debug, Default)]
struct QueueState {
    /// Downloads holding an admission slot, with the job that holds it.
    active: HashMap<DownloadId, JobId>,
}

pub struct DownloadManager {
    store: RecordStore,
    substrate: Arc<dyn JobSubstrate>,
    notifier: Arc<dyn NotificationSink>,
    config: DlqConfig,
    state: Mutex<QueueState>,
    job_seq: AtomicU64,
    event_task: std::sync::Mutex<Option<JoinHandle<()>>>,
    /// Held for the manager's lifetime; None for in-memory stores.
    _engine_lock: Option<EngineLock>,
}

impl DownloadManager {
    /// Claim the record store, recover records a previous process left in
    /// flight, start following job events, and admit whatever is queued.
    ///
    /// Fails with [`DownloadError::EngineRunning`] without touching any record
    /// when another manager already owns the same database file.
    pub async fn start(
        store: RecordStore,
        substrate: Arc<dyn JobSubstrate>,
        notifier: Arc<dyn NotificationSink>,
        config: DlqConfig,
    ) -> Result<Arc<Self>, DownloadError> {
        if config.notifications_enabled && !notifier.permitted() {
            return Err(ValidationError::NotificationsNotPermitted.into());
        }

        let engine_lock = match store.location() {
            Some(db) => match EngineLock::try_acquire(&EngineLock::path_for(db))? {
                Some(lock) => Some(lock),
                None => return Err(DownloadError::EngineRunning(db.to_path_buf())),
            },
            None => None,
        };

        let report = store.recover_interrupted().await?;
        if report.requeued > 0 || report.paused > 0 || !report.cancelled.is_empty() {
            tracing::info!(
                requeued = report.requeued,
                paused = report.paused,
                cancelled = report.cancelled.len(),
                "recovered interrupted downloads"
            );
        }
        for id in &report.cancelled {
            if let Some(record) = store.get(*id).await? {
                target::delete_download_files(&record.path, &record.file_name).await?;
            }
        }

        // Subscribe before the first submission so no terminal event is missed.
        let events = substrate.subscribe();
        let manager = Arc::new(Self {
            store,
            substrate,
            notifier,
            config,
            state: Mutex::new(QueueState::default()),
            job_seq: AtomicU64::new(0),
            event_task: std::sync::Mutex::new(None),
            _engine_lock: engine_lock,
        });

        let task = tokio::spawn(events::run_event_loop(Arc::downgrade(&manager), events));
        *manager
            .event_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(task);

        {
            let mut state = manager.state.lock().await;
            manager.admit_queued(&mut state).await?;
        }
        Ok(manager)
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn config(&self) -> &DlqConfig {
        &self.config
    }

    /// Observation queries over this manager's records.
    pub fn observer(&self) -> DownloadObserver {
        DownloadObserver::new(self.store.clone())
    }

    /// Current record for `id`.
    pub async fn get(&self, id: DownloadId) -> Result<Option<DownloadRecord>, DownloadError> {
        Ok(self.store.get(id).await?)
    }

    /// Number of downloads currently holding an admission slot.
    pub async fn active_count(&self) -> usize {
        self.state.lock().await.active.len()
    }

    fn next_job_id(&self, id: DownloadId) -> JobId {
        JobId::new(id, self.job_seq.fetch_add(1, Ordering::Relaxed) + 1)
    }

    fn notify(&self, event: TerminalEvent) {
        if self.config.notifications_enabled {
            self.notifier.notify(&event);
        }
    }
}

impl Drop for DownloadManager {
    fn drop(&mut self) {
        let task = self
            .event_task
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
        }
    }
}
