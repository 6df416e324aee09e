//! Record write operations. Every mutation bumps `last_modified` and the change counter.

use anyhow::{Context, Result};
use sqlx::query::Query;
use sqlx::sqlite::SqliteArguments;
use sqlx::Sqlite;
use std::collections::HashMap;

use super::super::db::{unix_millis, RecordStore};
use super::super::types::{DownloadId, DownloadRecord, Status, UserAction};

/// What `recover_interrupted` did to records left in flight by a previous process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Put back in the admission queue.
    pub requeued: u64,
    /// Last user action was PAUSE.
    pub paused: u64,
    /// Last user action was CANCEL; their files still need deleting.
    pub cancelled: Vec<DownloadId>,
}

impl RecordStore {
    /// Run one UPDATE/DELETE and notify subscribers when it touched a row.
    async fn commit<'q>(&self, query: Query<'q, Sqlite, SqliteArguments<'q>>) -> Result<bool> {
        let affected = query.execute(&self.pool).await?.rows_affected();
        if affected > 0 {
            self.notify_changed();
        }
        Ok(affected > 0)
    }

    /// Insert a new record. Fails if the id already exists.
    pub async fn insert(&self, record: &DownloadRecord) -> Result<()> {
        let headers_json = serde_json::to_string(&record.headers)?;
        let now = unix_millis();
        sqlx::query(
            r#"
            INSERT INTO downloads (
                id, url, path, file_name, tag, headers_json, metadata,
                status, user_action, total_bytes, downloaded_bytes, speed,
                etag, job_id, support_pause_resume, time_queued, last_modified,
                failure_reason
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12,
                      ?13, ?14, ?15, ?16, ?17, ?18)
            "#,
        )
        .bind(record.id)
        .bind(&record.url)
        .bind(&record.path)
        .bind(&record.file_name)
        .bind(&record.tag)
        .bind(headers_json)
        .bind(&record.metadata)
        .bind(record.status.as_str())
        .bind(record.user_action.as_str())
        .bind(record.total_bytes as i64)
        .bind(record.downloaded_bytes as i64)
        .bind(f64::from(record.speed))
        .bind(&record.etag)
        .bind(record.job_id.as_deref())
        .bind(record.support_pause_resume)
        .bind(record.time_queued)
        .bind(now)
        .bind(&record.failure_reason)
        .execute(&self.pool)
        .await
        .with_context(|| format!("insert download {}", record.id))?;
        self.notify_changed();
        Ok(())
    }

    pub async fn set_user_action(&self, id: DownloadId, action: UserAction) -> Result<bool> {
        self.commit(
            sqlx::query("UPDATE downloads SET user_action = ?1, last_modified = ?2 WHERE id = ?3")
                .bind(action.as_str())
                .bind(unix_millis())
                .bind(id),
        )
        .await
    }

    /// Move to QUEUED. `job_id` is the submitted job, or None while waiting for admission.
    pub async fn set_queued(&self, id: DownloadId, job_id: Option<&str>) -> Result<bool> {
        self.commit(
            sqlx::query(
                r#"
                UPDATE downloads
                SET status = 'queued', job_id = ?1, speed = 0, failure_reason = '',
                    last_modified = ?2
                WHERE id = ?3
                "#,
            )
            .bind(job_id)
            .bind(unix_millis())
            .bind(id),
        )
        .await
    }

    /// Refresh the caller-supplied parts of a re-requested target.
    pub async fn update_request(
        &self,
        id: DownloadId,
        tag: &str,
        headers: &HashMap<String, String>,
        metadata: &str,
        support_pause_resume: bool,
    ) -> Result<bool> {
        let headers_json = serde_json::to_string(headers)?;
        self.commit(
            sqlx::query(
                r#"
                UPDATE downloads
                SET tag = ?1, headers_json = ?2, metadata = ?3, support_pause_resume = ?4,
                    last_modified = ?5
                WHERE id = ?6
                "#,
            )
            .bind(tag.to_string())
            .bind(headers_json)
            .bind(metadata.to_string())
            .bind(support_pause_resume)
            .bind(unix_millis())
            .bind(id),
        )
        .await
    }

    pub async fn mark_started(&self, id: DownloadId, total_bytes: u64) -> Result<bool> {
        self.commit(
            sqlx::query(
                r#"
                UPDATE downloads
                SET status = 'started', total_bytes = ?1, last_modified = ?2
                WHERE id = ?3
                "#,
            )
            .bind(total_bytes as i64)
            .bind(unix_millis())
            .bind(id),
        )
        .await
    }

    pub async fn update_progress(
        &self,
        id: DownloadId,
        downloaded_bytes: u64,
        total_bytes: u64,
        speed: f32,
    ) -> Result<bool> {
        self.commit(
            sqlx::query(
                r#"
                UPDATE downloads
                SET status = 'progress', downloaded_bytes = ?1, total_bytes = ?2, speed = ?3,
                    last_modified = ?4
                WHERE id = ?5
                "#,
            )
            .bind(downloaded_bytes as i64)
            .bind(total_bytes as i64)
            .bind(f64::from(speed))
            .bind(unix_millis())
            .bind(id),
        )
        .await
    }

    pub async fn set_etag(&self, id: DownloadId, etag: &str) -> Result<bool> {
        self.commit(
            sqlx::query("UPDATE downloads SET etag = ?1, last_modified = ?2 WHERE id = ?3")
                .bind(etag.to_string())
                .bind(unix_millis())
                .bind(id),
        )
        .await
    }

    /// Forget transferred bytes after the partial file was discarded.
    pub async fn reset_progress(&self, id: DownloadId) -> Result<bool> {
        self.commit(
            sqlx::query(
                r#"
                UPDATE downloads
                SET downloaded_bytes = 0, total_bytes = 0, speed = 0, last_modified = ?1
                WHERE id = ?2
                "#,
            )
            .bind(unix_millis())
            .bind(id),
        )
        .await
    }

    pub async fn mark_success(
        &self,
        id: DownloadId,
        downloaded_bytes: u64,
        total_bytes: u64,
    ) -> Result<bool> {
        self.commit(
            sqlx::query(
                r#"
                UPDATE downloads
                SET status = 'success', downloaded_bytes = ?1, total_bytes = ?2, speed = 0,
                    failure_reason = '', last_modified = ?3
                WHERE id = ?4
                "#,
            )
            .bind(downloaded_bytes as i64)
            .bind(total_bytes as i64)
            .bind(unix_millis())
            .bind(id),
        )
        .await
    }

    pub async fn mark_failed(&self, id: DownloadId, reason: &str) -> Result<bool> {
        self.commit(
            sqlx::query(
                r#"
                UPDATE downloads
                SET status = 'failed', failure_reason = ?1, speed = 0, last_modified = ?2
                WHERE id = ?3
                "#,
            )
            .bind(reason.to_string())
            .bind(unix_millis())
            .bind(id),
        )
        .await
    }

    /// Plain status transition (PAUSED, CANCELLED, ...). Clears the sampled speed.
    pub async fn set_status(&self, id: DownloadId, status: Status) -> Result<bool> {
        self.commit(
            sqlx::query(
                "UPDATE downloads SET status = ?1, speed = 0, last_modified = ?2 WHERE id = ?3",
            )
            .bind(status.as_str())
            .bind(unix_millis())
            .bind(id),
        )
        .await
    }

    /// Repair records a dead process left in flight. No job survives a restart
    /// of the in-process runner, so every job id is dropped.
    pub async fn recover_interrupted(&self) -> Result<RecoveryReport> {
        let now = unix_millis();
        let mut tx = self.pool.begin().await?;

        let cancelled: Vec<DownloadId> = sqlx::query_scalar(
            r#"
            SELECT id FROM downloads
            WHERE status IN ('queued', 'started', 'progress') AND user_action = 'cancel'
            "#,
        )
        .fetch_all(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE downloads
            SET status = 'cancelled', job_id = NULL, speed = 0, last_modified = ?1
            WHERE status IN ('queued', 'started', 'progress') AND user_action = 'cancel'
            "#,
        )
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let paused = sqlx::query(
            r#"
            UPDATE downloads
            SET status = 'paused', job_id = NULL, speed = 0, last_modified = ?1
            WHERE status IN ('queued', 'started', 'progress') AND user_action = 'pause'
            "#,
        )
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let requeued = sqlx::query(
            r#"
            UPDATE downloads
            SET status = 'queued', job_id = NULL, speed = 0, last_modified = ?1
            WHERE status IN ('started', 'progress')
               OR (status = 'queued' AND job_id IS NOT NULL)
            "#,
        )
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;

        let report = RecoveryReport {
            requeued,
            paused,
            cancelled,
        };
        if report != RecoveryReport::default() {
            self.notify_changed();
        }
        Ok(report)
    }

    /// Delete a record. Returns whether a row existed.
    pub async fn remove(&self, id: DownloadId) -> Result<bool> {
        self.commit(sqlx::query("DELETE FROM downloads WHERE id = ?1").bind(id))
            .await
    }
}
