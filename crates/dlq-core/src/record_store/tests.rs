//! Tests for the record store (in-memory database).

use std::collections::HashMap;

use super::{DownloadRecord, RecordQuery, RecordStore, Status, UserAction};

fn record(id: i64, tag: &str, time_queued: i64) -> DownloadRecord {
    DownloadRecord {
        id,
        url: format!("https://example.com/{id}.bin"),
        path: "/tmp/dl".to_string(),
        file_name: format!("{id}.bin"),
        tag: tag.to_string(),
        headers: HashMap::from([("Authorization".to_string(), "Bearer x".to_string())]),
        metadata: "{\"k\":1}".to_string(),
        status: Status::Queued,
        user_action: UserAction::Start,
        total_bytes: 0,
        downloaded_bytes: 0,
        speed: 0.0,
        etag: String::new(),
        job_id: None,
        support_pause_resume: true,
        time_queued,
        last_modified: time_queued,
        failure_reason: String::new(),
    }
}

#[test]
fn status_and_action_strings_roundtrip() {
    for s in [
        Status::Default,
        Status::Queued,
        Status::Started,
        Status::Progress,
        Status::Success,
        Status::Cancelled,
        Status::Failed,
        Status::Paused,
    ] {
        assert_eq!(Status::from_str(s.as_str()), s);
    }
    assert_eq!(Status::from_str("garbage"), Status::Default);
    for a in [
        UserAction::Start,
        UserAction::Pause,
        UserAction::Resume,
        UserAction::Retry,
        UserAction::Cancel,
        UserAction::None,
    ] {
        assert_eq!(UserAction::from_str(a.as_str()), a);
    }
}

#[test]
fn progress_is_guarded_for_unknown_length() {
    let mut r = record(1, "", 0);
    assert_eq!(r.progress(), 0);
    r.total_bytes = 200;
    r.downloaded_bytes = 199;
    assert_eq!(r.progress(), 99);
    r.downloaded_bytes = 200;
    assert_eq!(r.progress(), 100);
}

#[tokio::test]
async fn insert_and_get_roundtrip() {
    let store = RecordStore::open_memory().await.unwrap();
    assert!(store.get(7).await.unwrap().is_none());

    let r = record(7, "music", 1_000);
    store.insert(&r).await.unwrap();
    let got = store.get(7).await.unwrap().unwrap();
    assert_eq!(got.url, r.url);
    assert_eq!(got.headers, r.headers);
    assert_eq!(got.metadata, r.metadata);
    assert_eq!(got.status, Status::Queued);
    assert_eq!(got.user_action, UserAction::Start);
    assert!(got.support_pause_resume);
    assert!(got.job_id.is_none());

    assert!(store.insert(&r).await.is_err(), "duplicate id must be rejected");
}

#[tokio::test]
async fn queries_filter_and_order_by_time_queued() {
    let store = RecordStore::open_memory().await.unwrap();
    store.insert(&record(3, "a", 300)).await.unwrap();
    store.insert(&record(1, "b", 100)).await.unwrap();
    store.insert(&record(2, "a", 200)).await.unwrap();
    store.set_status(1, Status::Failed).await.unwrap();

    let ids = |v: Vec<DownloadRecord>| v.into_iter().map(|r| r.id).collect::<Vec<_>>();

    assert_eq!(ids(store.query(&RecordQuery::All).await.unwrap()), vec![1, 2, 3]);
    assert_eq!(
        ids(store.query(&RecordQuery::Tag("a".into())).await.unwrap()),
        vec![2, 3]
    );
    assert_eq!(
        ids(store
            .query(&RecordQuery::Tags(vec!["a".into(), "b".into()]))
            .await
            .unwrap()),
        vec![1, 2, 3]
    );
    assert_eq!(
        ids(store.query(&RecordQuery::Status(Status::Failed)).await.unwrap()),
        vec![1]
    );
    assert_eq!(
        ids(store
            .query(&RecordQuery::Statuses(vec![Status::Queued, Status::Failed]))
            .await
            .unwrap()),
        vec![1, 2, 3]
    );
    assert_eq!(
        ids(store.query(&RecordQuery::Ids(vec![3, 1])).await.unwrap()),
        vec![1, 3]
    );
    assert!(store.query(&RecordQuery::Ids(vec![])).await.unwrap().is_empty());
    assert_eq!(ids(store.query(&RecordQuery::Id(2)).await.unwrap()), vec![2]);
}

#[tokio::test]
async fn queued_in_order_skips_records_holding_a_job() {
    let store = RecordStore::open_memory().await.unwrap();
    store.insert(&record(1, "", 100)).await.unwrap();
    store.insert(&record(2, "", 100)).await.unwrap();
    store.insert(&record(3, "", 50)).await.unwrap();
    store.set_queued(3, Some("3-1")).await.unwrap();

    let order: Vec<i64> = store
        .queued_in_order()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    // equal time_queued falls back to insertion order
    assert_eq!(order, vec![1, 2]);
}

#[tokio::test]
async fn lifecycle_updates() {
    let store = RecordStore::open_memory().await.unwrap();
    store.insert(&record(1, "", 1)).await.unwrap();
    store.insert(&record(2, "", 2)).await.unwrap();

    store.mark_started(1, 1000).await.unwrap();
    assert_eq!(store.get(1).await.unwrap().unwrap().status, Status::Started);
    store.update_progress(1, 400, 1000, 2.5).await.unwrap();
    store.mark_started(2, 0).await.unwrap();

    let r = store.get(1).await.unwrap().unwrap();
    assert_eq!(r.status, Status::Progress);
    assert_eq!(r.downloaded_bytes, 400);
    assert_eq!(r.progress(), 40);
    assert!((r.speed - 2.5).abs() < f32::EPSILON);

    store.mark_failed(1, "HTTP 500").await.unwrap();
    let r = store.get(1).await.unwrap().unwrap();
    assert_eq!(r.status, Status::Failed);
    assert_eq!(r.failure_reason, "HTTP 500");
    assert_eq!(r.speed, 0.0);

    store.set_queued(1, None).await.unwrap();
    let r = store.get(1).await.unwrap().unwrap();
    assert_eq!(r.status, Status::Queued);
    assert!(r.failure_reason.is_empty());

    store.reset_progress(1).await.unwrap();
    let r = store.get(1).await.unwrap().unwrap();
    assert_eq!((r.downloaded_bytes, r.total_bytes), (0, 0));

    store.mark_success(2, 10, 10).await.unwrap();
    assert_eq!(store.get(2).await.unwrap().unwrap().status, Status::Success);
}

#[tokio::test]
async fn mutations_bump_last_modified_and_revision() {
    let store = RecordStore::open_memory().await.unwrap();
    let mut rx = store.subscribe();
    store.insert(&record(1, "", 1)).await.unwrap();
    assert!(rx.has_changed().unwrap());
    rx.borrow_and_update();

    let before = store.get(1).await.unwrap().unwrap().last_modified;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    store.set_etag(1, "\"v2\"").await.unwrap();
    assert!(rx.has_changed().unwrap());
    let after = store.get(1).await.unwrap().unwrap();
    assert_eq!(after.etag, "\"v2\"");
    assert!(after.last_modified > before);

    rx.borrow_and_update();
    // no row touched, no revision
    assert!(!store.set_etag(99, "x").await.unwrap());
    assert!(!rx.has_changed().unwrap());
}

#[tokio::test]
async fn update_request_refreshes_caller_fields() {
    let store = RecordStore::open_memory().await.unwrap();
    store.insert(&record(1, "old", 1)).await.unwrap();
    let headers = HashMap::from([("X-Token".to_string(), "abc".to_string())]);
    store
        .update_request(1, "new", &headers, "meta", false)
        .await
        .unwrap();
    let r = store.get(1).await.unwrap().unwrap();
    assert_eq!(r.tag, "new");
    assert_eq!(r.headers, headers);
    assert_eq!(r.metadata, "meta");
    assert!(!r.support_pause_resume);
}

#[tokio::test]
async fn recover_interrupted_honours_last_user_action() {
    let store = RecordStore::open_memory().await.unwrap();
    for id in 1..=5 {
        store.insert(&record(id, "", id)).await.unwrap();
    }
    // 1: running, wanted running -> queued
    store.mark_started(1, 10).await.unwrap();
    // 2: running while a pause was unwinding -> paused
    store.update_progress(2, 5, 10, 1.0).await.unwrap();
    store.set_user_action(2, UserAction::Pause).await.unwrap();
    // 3: submitted but never ran -> queued without job
    store.set_queued(3, Some("3-1")).await.unwrap();
    // 4: running while a cancel was unwinding -> cancelled
    store.mark_started(4, 10).await.unwrap();
    store.set_user_action(4, UserAction::Cancel).await.unwrap();
    // 5: waiting for admission, untouched

    let report = store.recover_interrupted().await.unwrap();
    assert_eq!(report.requeued, 2);
    assert_eq!(report.paused, 1);
    assert_eq!(report.cancelled, vec![4]);

    let get = |id| {
        let store = store.clone();
        async move { store.get(id).await.unwrap().unwrap() }
    };
    assert_eq!(get(1).await.status, Status::Queued);
    assert_eq!(get(2).await.status, Status::Paused);
    assert_eq!(get(2).await.downloaded_bytes, 5);
    let three = get(3).await;
    assert_eq!(three.status, Status::Queued);
    assert!(three.job_id.is_none());
    assert_eq!(get(4).await.status, Status::Cancelled);
    assert_eq!(get(5).await.status, Status::Queued);

    assert_eq!(store.recover_interrupted().await.unwrap(), Default::default());
}

#[tokio::test]
async fn modified_before_and_remove() {
    let store = RecordStore::open_memory().await.unwrap();
    store.insert(&record(1, "", 1)).await.unwrap();
    let cutoff = super::unix_millis();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    store.insert(&record(2, "", 2)).await.unwrap();

    let old = store.query(&RecordQuery::ModifiedBefore(cutoff)).await.unwrap();
    assert_eq!(old.len(), 1);
    assert_eq!(old[0].id, 1);

    assert!(store.remove(1).await.unwrap());
    assert!(!store.remove(1).await.unwrap());
    assert!(store.get(1).await.unwrap().is_none());
}

#[tokio::test]
async fn open_at_persists_across_handles() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested dir").join("downloads.db");
    {
        let store = RecordStore::open_at(&path).await.unwrap();
        store.insert(&record(42, "t", 1)).await.unwrap();
    }
    let store = RecordStore::open_at(&path).await.unwrap();
    assert_eq!(store.get(42).await.unwrap().unwrap().tag, "t");
}
