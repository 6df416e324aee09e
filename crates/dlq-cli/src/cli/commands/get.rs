//! `dlq get <url>` – queue a download and run the queue until idle.

use anyhow::{Context, Result};
use dlq_core::target::derive_file_name;
use dlq_core::{DlqConfig, DownloadRequest};
use std::path::PathBuf;

use super::run::follow_or_hand_off;
use crate::cli::control_socket::ControlRequest;
use crate::cli::engine;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetArgs {
    pub url: String,
    pub output: Option<PathBuf>,
    pub name: Option<String>,
    pub tag: Option<String>,
    pub headers: Vec<String>,
    pub no_resume: bool,
}

/// Split a `Name: value` header argument.
pub fn parse_header(raw: &str) -> Result<(String, String)> {
    let (name, value) = raw
        .split_once(':')
        .with_context(|| format!("header {raw:?} is not in 'Name: value' form"))?;
    let name = name.trim();
    if name.is_empty() {
        anyhow::bail!("header {raw:?} has an empty name");
    }
    Ok((name.to_string(), value.trim().to_string()))
}

impl GetArgs {
    pub fn to_request(&self) -> Result<DownloadRequest> {
        let dir = match &self.output {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()?,
        };
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create output directory {}", dir.display()))?;
        let dir = dir.canonicalize().unwrap_or(dir);
        let name = self
            .name
            .clone()
            .unwrap_or_else(|| derive_file_name(&self.url));

        let mut request = DownloadRequest::new(self.url.clone(), dir.to_string_lossy(), name)
            .support_pause_resume(!self.no_resume);
        if let Some(tag) = &self.tag {
            request = request.tag(tag.clone());
        }
        for raw in &self.headers {
            let (name, value) = parse_header(raw)?;
            request = request.header(name, value);
        }
        Ok(request)
    }
}

pub async fn run_get(cfg: DlqConfig, args: GetArgs) -> Result<()> {
    let request = args.to_request()?;
    let id = request.id();
    let engine = engine::attach(cfg, true).await?;
    println!("{}", engine.request(ControlRequest::Download { request }).await?);
    follow_or_hand_off(&engine, Some(id)).await
}
