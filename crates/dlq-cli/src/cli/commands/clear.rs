//! `dlq clear` – remove records and, by default, their files.

use anyhow::Result;
use dlq_core::DlqConfig;
use serde::{Deserialize, Serialize};

use crate::cli::control_socket::ControlRequest;
use crate::cli::engine;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearTarget {
    All,
    Id(i64),
    Tag(String),
    /// Records last modified at least this many seconds ago.
    OlderThan(u64),
}

impl ClearTarget {
    pub fn from_args(id: Option<i64>, tag: Option<String>, older_than_secs: Option<u64>) -> Self {
        match (id, tag, older_than_secs) {
            (Some(id), _, _) => ClearTarget::Id(id),
            (None, Some(tag), _) => ClearTarget::Tag(tag),
            (None, None, Some(secs)) => ClearTarget::OlderThan(secs),
            (None, None, None) => ClearTarget::All,
        }
    }
}

pub async fn run_clear(cfg: DlqConfig, target: ClearTarget, delete_files: bool) -> Result<()> {
    let engine = engine::attach(cfg, false).await?;
    let line = engine
        .request(ControlRequest::Clear {
            target: target.clone(),
            delete_files,
        })
        .await?;
    tracing::debug!(?target, delete_files, "records cleared");
    println!("{line}");
    Ok(())
}
