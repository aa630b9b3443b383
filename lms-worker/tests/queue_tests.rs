//! Job lifecycle against PostgreSQL
//!
//! Run with `DATABASE_URL=... cargo test -p lms-worker -- --ignored`.

mod common;

use chrono::{Duration, NaiveDate, Utc};
use common::TestDb;
use lms_shared::models::job::{JobPayload, JobState, NewJob};
use lms_shared::store::postgres::PgStore;
use lms_worker::mailer::MailError;
use lms_worker::orchestrator::execute_job;
use lms_worker::scheduler::{dedupe_key, DeactivationScheduler};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_notify_job_succeeds_and_stores_result() {
    let db = TestDb::new().await.unwrap();
    let (course, user) = db.course_with_subscriber().await.unwrap();

    let id = db
        .enqueue(NewJob::now(JobPayload::NotifyCourseUpdated { course_id: course.id }))
        .await
        .unwrap();

    let job = db.claim_one(id).await.unwrap();
    assert_eq!(job.state, JobState::Running);
    assert!(job.started_at.is_some());

    execute_job(&db.queue, &db.runner, job).await.unwrap();

    let job = db.job(id).await.unwrap();
    assert_eq!(job.state, JobState::Succeeded);
    assert_eq!(job.result, Some(json!({"sent": 1})));
    assert!(job.finished_at.is_some());

    let sent = db.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].bcc, vec![user.email]);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_transport_failure_schedules_retry() {
    let db = TestDb::new().await.unwrap();
    let (course, _) = db.course_with_subscriber().await.unwrap();
    db.mailer
        .fail_with(MailError::Transport("connection refused".to_string()));

    let id = db
        .enqueue(NewJob::now(JobPayload::NotifyCourseUpdated { course_id: course.id }))
        .await
        .unwrap();

    let before = Utc::now();
    let job = db.claim_one(id).await.unwrap();
    execute_job(&db.queue, &db.runner, job).await.unwrap();

    let job = db.job(id).await.unwrap();
    assert_eq!(job.state, JobState::Pending);
    assert_eq!(job.attempts, 1);
    assert!(job.run_at >= before + Duration::seconds(29));
    assert!(job.last_error.as_deref().unwrap().contains("connection refused"));

    // Backoff keeps it out of the next claim
    let claimed = db.queue.claim(1000).await.unwrap();
    assert!(claimed.iter().all(|j| j.id != id));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_last_attempt_marks_failed() {
    let db = TestDb::new().await.unwrap();
    let (course, _) = db.course_with_subscriber().await.unwrap();
    db.mailer.fail_with(MailError::Rejected {
        status: 500,
        message: "upstream".to_string(),
    });

    let mut new_job = NewJob::now(JobPayload::NotifyCourseUpdated { course_id: course.id });
    new_job.max_attempts = 1;
    let id = db.enqueue(new_job).await.unwrap();

    let job = db.claim_one(id).await.unwrap();
    execute_job(&db.queue, &db.runner, job).await.unwrap();

    let job = db.job(id).await.unwrap();
    assert_eq!(job.state, JobState::Failed);
    assert_eq!(job.attempts, 1);
    assert!(job.finished_at.is_some());
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_undecodable_payload_fails_without_retry() {
    let db = TestDb::new().await.unwrap();
    let id = db
        .insert_raw("send_newsletter", json!({"kind": "send_newsletter"}), "pending")
        .await
        .unwrap();

    let job = db.claim_one(id).await.unwrap();
    execute_job(&db.queue, &db.runner, job).await.unwrap();

    let job = db.job(id).await.unwrap();
    assert_eq!(job.state, JobState::Failed);
    assert!(job.last_error.as_deref().unwrap().starts_with("Invalid payload"));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_stale_running_job_returns_to_queue() {
    let db = TestDb::new().await.unwrap();
    let id = db
        .insert_raw("deactivate_inactive_users", json!({"kind": "deactivate_inactive_users", "days": 30}), "running")
        .await
        .unwrap();

    sqlx::query("UPDATE jobs SET started_at = NOW() - INTERVAL '20 minutes' WHERE id = $1")
        .bind(id)
        .execute(&db.pool)
        .await
        .unwrap();

    assert!(db.queue.reset_stale().await.unwrap() >= 1);

    let job = db.job(id).await.unwrap();
    assert_eq!(job.state, JobState::Pending);
    assert!(job.started_at.is_none());

    // A finished job cannot be completed a second time
    let job = db.claim_one(id).await.unwrap();
    execute_job(&db.queue, &db.runner, job.clone()).await.unwrap();
    assert!(db.queue.mark_succeeded(id, &json!(0)).await.is_err());
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_scheduler_dedupes_across_workers() {
    let db = TestDb::new().await.unwrap();
    let store = Arc::new(PgStore::new(db.pool.clone()));

    // Far-future date unique to this run
    let offset = (Uuid::new_v4().as_u128() % 300_000) as i32;
    let date = NaiveDate::from_num_days_from_ce_opt(1_000_000 + offset).unwrap();

    let first = DeactivationScheduler::new(store.clone(), 0, 30, 5);
    let second = DeactivationScheduler::new(store, 0, 30, 5);

    let id = first.enqueue_for(date).await.unwrap().unwrap();
    assert!(second.enqueue_for(date).await.unwrap().is_none());

    let job = db.job(id).await.unwrap();
    assert_eq!(job.dedupe_key, Some(dedupe_key(date)));
    assert_eq!(job.kind, "deactivate_inactive_users");

    sqlx::query("DELETE FROM jobs WHERE id = $1")
        .bind(id)
        .execute(&db.pool)
        .await
        .unwrap();
}
