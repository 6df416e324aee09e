//! `dlq retry <id>` – retry a failed download, then run the queue.

use anyhow::Result;
use dlq_core::DlqConfig;

use super::run::follow_or_hand_off;
use crate::cli::control_socket::ControlRequest;
use crate::cli::engine;

pub async fn run_retry(cfg: DlqConfig, id: i64) -> Result<()> {
    let engine = engine::attach(cfg, true).await?;
    println!("{}", engine.request(ControlRequest::Retry { id }).await?);
    follow_or_hand_off(&engine, Some(id)).await
}
