/// Worker orchestrator
///
/// The main loop: claim a batch of due jobs, run them concurrently, record
/// each outcome, repeat.
///
/// ```text
/// WorkerOrchestrator
///   ├─> JobQueue: claim due jobs (SKIP LOCKED)
///   ├─> JobRunner: decode payload, run handler
///   └─> JobQueue: succeeded | retry with backoff | failed
/// ```
///
/// A batch is awaited before the next claim, so at most `batch_size` jobs
/// run at once per worker. Shutdown is requested through
/// [`WorkerOrchestrator::shutdown_token`]; the batch in flight finishes
/// first.

use std::time::Duration;

use lms_shared::models::job::Job;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::jobs::JobError;
use crate::queue::{JobQueue, QueueError};
use crate::runner::JobRunner;

/// Worker orchestrator configuration
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Sleep between polls when the queue is empty
    pub poll_interval_secs: u64,

    /// Jobs claimed per poll
    pub batch_size: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        OrchestratorConfig {
            poll_interval_secs: 1,
            batch_size: 10,
        }
    }
}

/// Worker orchestrator
pub struct WorkerOrchestrator {
    queue: JobQueue,
    runner: JobRunner,
    config: OrchestratorConfig,
    shutdown_token: CancellationToken,
}

impl WorkerOrchestrator {
    pub fn new(queue: JobQueue, runner: JobRunner, config: OrchestratorConfig) -> Self {
        WorkerOrchestrator {
            queue,
            runner,
            config,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Token that stops the loop when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Runs until shutdown
    pub async fn run(&self) -> anyhow::Result<()> {
        tracing::info!(
            batch_size = self.config.batch_size,
            poll_interval_secs = self.config.poll_interval_secs,
            "Worker orchestrator starting"
        );

        if let Err(e) = self.queue.reset_stale().await {
            tracing::error!(error = %e, "Failed to reset stale jobs");
        }

        let idle = Duration::from_secs(self.config.poll_interval_secs);

        while !self.shutdown_token.is_cancelled() {
            let jobs = match self.queue.claim(self.config.batch_size).await {
                Ok(jobs) => jobs,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to claim jobs");
                    self.pause(idle).await;
                    continue;
                }
            };

            if jobs.is_empty() {
                self.pause(idle).await;
                continue;
            }

            let mut batch = JoinSet::new();
            for job in jobs {
                let queue = self.queue.clone();
                let runner = self.runner.clone();
                let span = tracing::info_span!("job", job_id = %job.id, kind = %job.kind);
                batch.spawn(async move { execute_job(&queue, &runner, job).await }.instrument(span));
            }

            while let Some(joined) = batch.join_next().await {
                match joined {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => tracing::error!(error = %e, "Failed to record job outcome"),
                    Err(e) => tracing::error!(error = %e, "Job task panicked"),
                }
            }
        }

        tracing::info!("Worker orchestrator shut down");
        Ok(())
    }

    async fn pause(&self, duration: Duration) {
        tokio::select! {
            _ = self.shutdown_token.cancelled() => {}
            _ = tokio::time::sleep(duration) => {}
        }
    }
}

/// Runs one claimed job and records the outcome
///
/// A job that panics stays `running` until [`JobQueue::reset_stale`]
/// returns it to the queue.
pub async fn execute_job(queue: &JobQueue, runner: &JobRunner, job: Job) -> Result<(), QueueError> {
    tracing::info!(attempt = job.attempts + 1, "Executing job");

    let outcome = match job.decode_payload() {
        Ok(payload) => runner.run(&payload).await,
        Err(e) => Err(JobError::InvalidPayload(e.to_string())),
    };

    match outcome {
        Ok(result) => queue.mark_succeeded(job.id, &result).await,
        Err(e) => {
            queue
                .mark_failed(&job, &e.to_string(), e.is_retryable())
                .await?;
            Ok(())
        }
    }
}
