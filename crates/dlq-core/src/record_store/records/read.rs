//! Record read operations: get, query, admission helpers.

use anyhow::{Context, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};
use std::collections::HashMap;

use super::super::db::RecordStore;
use super::super::types::{DownloadId, DownloadRecord, RecordQuery, Status, UserAction};

const COLUMNS: &str = "SELECT id, url, path, file_name, tag, headers_json, metadata, status, \
     user_action, total_bytes, downloaded_bytes, speed, etag, job_id, support_pause_resume, \
     time_queued, last_modified, failure_reason FROM downloads";

const ORDER: &str = " ORDER BY time_queued ASC, seq ASC";

fn record_from_row(row: &SqliteRow) -> Result<DownloadRecord> {
    let headers_json: String = row.get("headers_json");
    let headers: HashMap<String, String> = if headers_json.is_empty() {
        HashMap::new()
    } else {
        serde_json::from_str(&headers_json).context("decode stored headers")?
    };
    let status: String = row.get("status");
    let user_action: String = row.get("user_action");
    let total_bytes: i64 = row.get("total_bytes");
    let downloaded_bytes: i64 = row.get("downloaded_bytes");
    let speed: f64 = row.get("speed");
    let support: i64 = row.get("support_pause_resume");

    Ok(DownloadRecord {
        id: row.get("id"),
        url: row.get("url"),
        path: row.get("path"),
        file_name: row.get("file_name"),
        tag: row.get("tag"),
        headers,
        metadata: row.get("metadata"),
        status: Status::from_str(&status),
        user_action: UserAction::from_str(&user_action),
        total_bytes: total_bytes.max(0) as u64,
        downloaded_bytes: downloaded_bytes.max(0) as u64,
        speed: speed as f32,
        etag: row.get("etag"),
        job_id: row.get("job_id"),
        support_pause_resume: support != 0,
        time_queued: row.get("time_queued"),
        last_modified: row.get("last_modified"),
        failure_reason: row.get("failure_reason"),
    })
}

impl RecordStore {
    /// Get one record by id, if present.
    pub async fn get(&self, id: DownloadId) -> Result<Option<DownloadRecord>> {
        let row = sqlx::query(&format!("{COLUMNS} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(record_from_row).transpose()
    }

    /// Records matching `query`, oldest `time_queued` first.
    pub async fn query(&self, query: &RecordQuery) -> Result<Vec<DownloadRecord>> {
        let mut qb = QueryBuilder::<Sqlite>::new(COLUMNS);
        match query {
            RecordQuery::All => {}
            RecordQuery::Id(id) => {
                qb.push(" WHERE id = ").push_bind(*id);
            }
            RecordQuery::Ids(ids) => {
                if ids.is_empty() {
                    return Ok(Vec::new());
                }
                qb.push(" WHERE id IN (");
                let mut list = qb.separated(", ");
                for id in ids {
                    list.push_bind(*id);
                }
                list.push_unseparated(")");
            }
            RecordQuery::Tag(tag) => {
                qb.push(" WHERE tag = ").push_bind(tag.clone());
            }
            RecordQuery::Tags(tags) => {
                if tags.is_empty() {
                    return Ok(Vec::new());
                }
                qb.push(" WHERE tag IN (");
                let mut list = qb.separated(", ");
                for tag in tags {
                    list.push_bind(tag.clone());
                }
                list.push_unseparated(")");
            }
            RecordQuery::Status(status) => {
                qb.push(" WHERE status = ").push_bind(status.as_str());
            }
            RecordQuery::Statuses(statuses) => {
                if statuses.is_empty() {
                    return Ok(Vec::new());
                }
                qb.push(" WHERE status IN (");
                let mut list = qb.separated(", ");
                for status in statuses {
                    list.push_bind(status.as_str());
                }
                list.push_unseparated(")");
            }
            RecordQuery::ModifiedBefore(ms) => {
                qb.push(" WHERE last_modified <= ").push_bind(*ms);
            }
        }
        qb.push(ORDER);

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(record_from_row).collect()
    }

    /// QUEUED records that have not been handed to a job yet, in admission order.
    pub async fn queued_in_order(&self) -> Result<Vec<DownloadRecord>> {
        let rows = sqlx::query(&format!(
            "{COLUMNS} WHERE status = 'queued' AND job_id IS NULL{ORDER}"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(record_from_row).collect()
    }
}
