//! `dlq run` – recover interrupted downloads and run the queue until idle.

use anyhow::Result;
use dlq_core::{DlqConfig, DownloadId, DownloadModel, Status};

use crate::cli::engine::{self, Engine};

pub async fn run_queue(cfg: DlqConfig) -> Result<()> {
    let engine = engine::attach(cfg, true).await?;
    let Engine::Local { manager, .. } = &engine else {
        anyhow::bail!("another dlq engine is already running the queue");
    };
    let finished = engine::follow(manager).await?;
    if finished.is_empty() {
        println!("No downloads.");
        return Ok(());
    }
    report(&finished, None)
}

/// Follow the queue to idle when this process owns it; otherwise the running
/// engine has taken the request and there is nothing left to do here.
pub async fn follow_or_hand_off(engine: &Engine, focus: Option<DownloadId>) -> Result<()> {
    match engine {
        Engine::Local { manager, .. } => {
            let finished = engine::follow(manager).await?;
            report(&finished, focus)
        }
        Engine::Remote(socket) => {
            tracing::debug!(socket = %socket.display(), "request handed to running engine");
            println!("Handed to the running dlq engine; see `dlq status`.");
            Ok(())
        }
    }
}

/// Summarize the final snapshot. Fails when `focus` (the download the command was
/// about) ended FAILED.
pub fn report(finished: &[DownloadModel], focus: Option<DownloadId>) -> Result<()> {
    let count = |s: Status| finished.iter().filter(|m| m.status == s).count();
    tracing::info!(
        success = count(Status::Success),
        failed = count(Status::Failed),
        paused = count(Status::Paused),
        "queue idle"
    );
    println!(
        "{} done, {} failed, {} paused",
        count(Status::Success),
        count(Status::Failed),
        count(Status::Paused)
    );
    if let Some(m) = focus.and_then(|id| finished.iter().find(|m| m.id == id)) {
        if m.status == Status::Failed {
            anyhow::bail!("{} failed: {}", m.file_name, m.failure_reason);
        }
    }
    Ok(())
}
