//! `dlq status` – show all downloads.

use anyhow::Result;
use dlq_core::{DlqConfig, DownloadObserver};

use crate::cli::engine;

pub async fn run_status(cfg: &DlqConfig, tag: Option<&str>) -> Result<()> {
    let observer = DownloadObserver::new(engine::open_store(cfg).await?);
    let downloads = match tag {
        Some(tag) => observer.get_by_tag(tag).await?,
        None => observer.get_all().await?,
    };
    if downloads.is_empty() {
        println!("No downloads in database.");
        return Ok(());
    }
    println!("{:<20} {:<10} {:>4}  {}", "ID", "STATUS", "%", "SIZE / FILE");
    for m in &downloads {
        println!("{}", engine::describe(m));
    }
    Ok(())
}
