//! Safe resume: compare a record's stored ETag with a fresh probe before
//! any byte of a partial file is reused.

use anyhow::Result;

use crate::fetch_head::HeadResult;

/// Outcome of re-validating remote content before a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentCheck {
    /// Same validator as stored; the partial file may be resumed.
    Unchanged,
    /// Validator differs (including appearing or disappearing). The partial
    /// file must be discarded and `latest` persisted.
    Changed { latest: String },
    /// Probe failed. Nothing is discarded; the transfer itself surfaces any
    /// real network error.
    Unverified,
}

/// Compare `stored_etag` ("" = none known) with the probe result.
pub fn check_content(stored_etag: &str, probe: &Result<HeadResult>) -> ContentCheck {
    match probe {
        Ok(head) => {
            let latest = head.etag_or_empty();
            if latest == stored_etag {
                ContentCheck::Unchanged
            } else {
                ContentCheck::Changed {
                    latest: latest.to_string(),
                }
            }
        }
        Err(e) => {
            tracing::warn!("content check skipped, probe failed: {:#}", e);
            ContentCheck::Unverified
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn head(etag: Option<&str>) -> Result<HeadResult> {
        Ok(HeadResult {
            etag: etag.map(str::to_string),
            ..HeadResult::default()
        })
    }

    #[test]
    fn same_etag_is_unchanged() {
        assert_eq!(check_content("v1", &head(Some("v1"))), ContentCheck::Unchanged);
        assert_eq!(check_content("", &head(None)), ContentCheck::Unchanged);
    }

    #[test]
    fn different_etag_is_changed() {
        assert_eq!(
            check_content("v1", &head(Some("v2"))),
            ContentCheck::Changed {
                latest: "v2".into()
            }
        );
        assert_eq!(
            check_content("", &head(Some("v1"))),
            ContentCheck::Changed {
                latest: "v1".into()
            }
        );
        assert_eq!(
            check_content("v1", &head(None)),
            ContentCheck::Changed {
                latest: String::new()
            }
        );
    }

    #[test]
    fn probe_failure_is_unverified() {
        let failed: Result<HeadResult> = Err(anyhow::anyhow!("connection refused"));
        assert_eq!(check_content("v1", &failed), ContentCheck::Unverified);
    }
}
