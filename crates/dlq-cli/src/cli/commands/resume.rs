//! `dlq resume <id>` – resume a paused download, then run the queue.

use anyhow::Result;
use dlq_core::DlqConfig;

use super::run::follow_or_hand_off;
use crate::cli::control_socket::ControlRequest;
use crate::cli::engine;

pub async fn run_resume(cfg: DlqConfig, id: i64) -> Result<()> {
    let engine = engine::attach(cfg, true).await?;
    println!("{}", engine.request(ControlRequest::Resume { id }).await?);
    follow_or_hand_off(&engine, Some(id)).await
}
