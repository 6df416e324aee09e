//! `dlq pause <id>` – pause a download. A running engine is asked to stop it.

use anyhow::Result;
use dlq_core::DlqConfig;

use crate::cli::control_socket::ControlRequest;
use crate::cli::engine;

pub async fn run_pause(cfg: DlqConfig, id: i64) -> Result<()> {
    let engine = engine::attach(cfg, false).await?;
    println!("{}", engine.request(ControlRequest::Pause { id }).await?);
    Ok(())
}
