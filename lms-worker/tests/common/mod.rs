//! Shared helpers for worker integration tests
//!
//! Every test here needs PostgreSQL and is marked
//! `#[ignore = "requires DATABASE_URL"]`. Claiming takes any due job in the
//! table, so tests hold [`DB_LOCK`] while they run.

#![allow(dead_code)]

use std::sync::Arc;

use lms_shared::{
    db::{
        migrations::run_migrations,
        pool::{create_pool, DatabaseConfig},
    },
    models::{
        course::{Course, CreateCourse},
        job::{Job, NewJob},
        subscription::Subscription,
        user::{CreateUser, User},
    },
    store::postgres::PgStore,
};
use lms_worker::{mailer::RecordingMailer, queue::JobQueue, runner::JobRunner};
use serde_json::Value;
use sqlx::PgPool;
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

pub static DB_LOCK: Mutex<()> = Mutex::const_new(());

pub const FROM: &str = "no-reply@example.com";

pub struct TestDb {
    pub pool: PgPool,
    pub queue: JobQueue,
    pub mailer: RecordingMailer,
    pub runner: JobRunner,
    _guard: MutexGuard<'static, ()>,
}

impl TestDb {
    pub async fn new() -> anyhow::Result<Self> {
        let guard = DB_LOCK.lock().await;

        let url = std::env::var("DATABASE_URL")?;
        let pool = create_pool(DatabaseConfig::new(url)).await?;
        run_migrations(&pool).await?;

        let store = Arc::new(PgStore::new(pool.clone()));
        let mailer = RecordingMailer::new();
        let runner = JobRunner::new(store.clone(), store, Arc::new(mailer.clone()), FROM);

        Ok(Self {
            queue: JobQueue::new(pool.clone()),
            pool,
            mailer,
            runner,
            _guard: guard,
        })
    }

    pub async fn create_user(&self) -> anyhow::Result<User> {
        let user = User::create(
            &self.pool,
            CreateUser {
                email: format!("worker-{}@example.com", Uuid::new_v4()),
                ..Default::default()
            },
        )
        .await?;
        Ok(user)
    }

    /// Course with one subscriber
    pub async fn course_with_subscriber(&self) -> anyhow::Result<(Course, User)> {
        let user = self.create_user().await?;
        let course = Course::create(
            &self.pool,
            CreateCourse {
                title: "Worker course".to_string(),
                description: String::new(),
                preview: None,
                owner_id: None,
            },
        )
        .await?;
        Subscription::insert_if_absent(&self.pool, user.id, course.id).await?;
        Ok((course, user))
    }

    pub async fn enqueue(&self, job: NewJob) -> anyhow::Result<Uuid> {
        Job::enqueue(&self.pool, &job)
            .await?
            .ok_or_else(|| anyhow::anyhow!("job was deduplicated"))
    }

    /// Inserts a row bypassing the typed payload
    pub async fn insert_raw(&self, kind: &str, payload: Value, state: &str) -> anyhow::Result<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO jobs (id, kind, payload, state, started_at)
            VALUES ($1, $2, $3, $4, CASE WHEN $4 = 'running' THEN NOW() ELSE NULL END)
            "#,
        )
        .bind(id)
        .bind(kind)
        .bind(payload)
        .bind(state)
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn job(&self, id: Uuid) -> anyhow::Result<Job> {
        let job = sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(job)
    }

    /// Claims everything due and returns our job
    pub async fn claim_one(&self, id: Uuid) -> anyhow::Result<Job> {
        self.queue
            .claim(1000)
            .await?
            .into_iter()
            .find(|job| job.id == id)
            .ok_or_else(|| anyhow::anyhow!("job {} was not claimed", id))
    }
}
