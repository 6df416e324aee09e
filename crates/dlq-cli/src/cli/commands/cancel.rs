//! `dlq cancel <id>` – cancel a download and delete its files.

use anyhow::Result;
use dlq_core::DlqConfig;

use crate::cli::control_socket::ControlRequest;
use crate::cli::engine;

pub async fn run_cancel(cfg: DlqConfig, id: i64) -> Result<()> {
    let engine = engine::attach(cfg, false).await?;
    println!("{}", engine.request(ControlRequest::Cancel { id }).await?);
    Ok(())
}
