//! Durable download table (SQLite via sqlx) with a change counter.
//!
//! One row per download target, keyed by the stable id from `target::download_id`.
//! Subscribers of [`RecordStore::subscribe`] see a new revision after every
//! committed mutation; the observation layer re-queries on each one.

pub mod db;
pub mod records;
pub mod types;

pub use db::*;
pub use records::RecoveryReport;
pub use types::*;

#[cfg(test)]
mod tests;
