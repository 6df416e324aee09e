//! CLI for the DLQ download engine.

mod commands;
mod control_socket;
mod engine;

use anyhow::Result;
use clap::{Parser, Subcommand};
use dlq_core::config;
use std::path::PathBuf;

use commands::{
    run_cancel, run_clear, run_get, run_pause, run_queue, run_resume, run_retry, run_status,
    ClearTarget, GetArgs,
};

/// Top-level CLI for the DLQ download engine.
#[derive(Debug, Parser)]
#[command(name = "dlq")]
#[command(about = "DLQ: resumable background download queue", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Queue a download and run the queue until it is idle.
    Get {
        /// Direct HTTP/HTTPS URL to download.
        url: String,
        /// Directory to save into (default: current directory).
        #[arg(short = 'o', long, value_name = "DIR")]
        output: Option<PathBuf>,
        /// File name (default: last URL path segment).
        #[arg(short = 'n', long)]
        name: Option<String>,
        /// Group tag for bulk operations.
        #[arg(long)]
        tag: Option<String>,
        /// Extra request header, e.g. -H 'Authorization: Bearer x'. Repeatable.
        #[arg(short = 'H', long = "header", value_name = "NAME: VALUE")]
        headers: Vec<String>,
        /// Never resume; always download from the first byte.
        #[arg(long)]
        no_resume: bool,
    },

    /// Recover interrupted downloads and run the queue until it is idle.
    Run,

    /// Show all downloads (or those with a tag).
    Status {
        #[arg(long)]
        tag: Option<String>,
    },

    /// Pause a download by its ID.
    Pause {
        /// Download identifier.
        id: i64,
    },

    /// Resume a paused (or cancelled) download and run the queue.
    Resume {
        /// Download identifier.
        id: i64,
    },

    /// Retry a failed (or cancelled) download and run the queue.
    Retry {
        /// Download identifier.
        id: i64,
    },

    /// Cancel a download and delete its files.
    Cancel {
        /// Download identifier.
        id: i64,
    },

    /// Remove records (all by default) and, unless --keep-files, their files.
    Clear {
        #[arg(long, conflicts_with_all = ["tag", "older_than_secs"])]
        id: Option<i64>,
        #[arg(long, conflicts_with = "older_than_secs")]
        tag: Option<String>,
        /// Only records untouched for at least this many seconds.
        #[arg(long, value_name = "SECS")]
        older_than_secs: Option<u64>,
        #[arg(long)]
        keep_files: bool,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Get {
                url,
                output,
                name,
                tag,
                headers,
                no_resume,
            } => {
                let args = GetArgs {
                    url,
                    output,
                    name,
                    tag,
                    headers,
                    no_resume,
                };
                run_get(cfg, args).await?
            }
            CliCommand::Run => run_queue(cfg).await?,
            CliCommand::Status { tag } => run_status(&cfg, tag.as_deref()).await?,
            CliCommand::Pause { id } => run_pause(cfg, id).await?,
            CliCommand::Resume { id } => run_resume(cfg, id).await?,
            CliCommand::Retry { id } => run_retry(cfg, id).await?,
            CliCommand::Cancel { id } => run_cancel(cfg, id).await?,
            CliCommand::Clear {
                id,
                tag,
                older_than_secs,
                keep_files,
            } => {
                let target = ClearTarget::from_args(id, tag, older_than_secs);
                run_clear(cfg, target, !keep_files).await?
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
