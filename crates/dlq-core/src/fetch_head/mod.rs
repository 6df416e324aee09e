//! Headers-only probe.
//!
//! Uses the curl crate (libcurl) to fetch the current `ETag` of a resource
//! before a transfer starts, so a partial file is never resumed against
//! content that changed.

mod parse;

pub(crate) use parse::parse_headers;

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::str;
use std::time::Duration;

/// Response headers of interest to the transfer layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadResult {
    /// Size in bytes, if `Content-Length` is present.
    pub content_length: Option<u64>,
    /// `ETag` without surrounding quotes.
    pub etag: Option<String>,
}

impl HeadResult {
    /// ETag as stored on records: empty when the server sends none.
    pub fn etag_or_empty(&self) -> &str {
        self.etag.as_deref().unwrap_or("")
    }
}

/// Build the curl header list for caller-supplied request headers ("Name: value").
pub(crate) fn header_list(
    custom_headers: &HashMap<String, String>,
) -> Result<curl::easy::List, curl::Error> {
    let mut list = curl::easy::List::new();
    for (k, v) in custom_headers {
        list.append(&format!("{}: {}", k.trim(), v.trim()))?;
    }
    Ok(list)
}

/// Performs a HEAD request and returns the parsed headers of the final response.
///
/// Follows redirects. Runs in the current thread; use [`probe_async`] from async code.
pub fn probe(
    url: &str,
    custom_headers: &HashMap<String, String>,
    connect_timeout: Duration,
    read_timeout: Duration,
) -> Result<HeadResult> {
    let mut headers: Vec<String> = Vec::new();

    let mut easy = curl::easy::Easy::new();
    easy.url(url).context("invalid URL")?;
    easy.nobody(true)?; // HEAD request
    easy.follow_location(true)?;
    easy.connect_timeout(connect_timeout)?;
    easy.timeout(connect_timeout + read_timeout)?;
    if !custom_headers.is_empty() {
        easy.http_headers(header_list(custom_headers)?)?;
    }

    {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            if let Ok(s) = str::from_utf8(data) {
                headers.push(s.trim_end().to_string());
            }
            true
        })?;
        transfer.perform().context("HEAD request failed")?;
    }

    let code = easy.response_code().context("no response code")?;
    if !(200..300).contains(&code) {
        anyhow::bail!("HEAD {} returned HTTP {}", url, code);
    }

    Ok(parse_headers(&headers))
}

/// [`probe`] on the blocking pool.
pub async fn probe_async(
    url: String,
    custom_headers: HashMap<String, String>,
    connect_timeout: Duration,
    read_timeout: Duration,
) -> Result<HeadResult> {
    tokio::task::spawn_blocking(move || probe(&url, &custom_headers, connect_timeout, read_timeout))
        .await
        .context("probe task panicked")?
}
