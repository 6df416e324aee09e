pub mod config;
pub mod error;
pub mod logging;

pub mod control;
pub mod engine_lock;
pub mod fetch_head;
pub mod jobs;
pub mod manager;
pub mod notify;
pub mod observe;
pub mod record_store;
pub mod safe_resume;
pub mod storage;
pub mod target;
pub mod transfer;

pub use config::DlqConfig;
pub use engine_lock::EngineLock;
pub use error::{DownloadError, ValidationError};
pub use jobs::{JobSubstrate, LocalJobRunner};
pub use manager::{DownloadManager, DownloadRequest};
pub use notify::{NotificationSink, TracingNotifier};
pub use observe::{DownloadModel, DownloadObserver, Observation};
pub use record_store::{DownloadId, RecordStore, Status, UserAction};
