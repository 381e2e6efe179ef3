//! Bounded worker pool consuming the job queue

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::job_queue::{FailureOutcome, JobQueue, JobQueueError};
use crate::application::executor::ScanExecutor;
use crate::application::workflow::{ScanWorkflow, WorkflowError};
use crate::domain::{Job, JobId};

/// Pause after a queue error before polling again
const CLAIM_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Tries at writing a job outcome before the job is released
const RECORD_ATTEMPTS: u32 = 4;
const RECORD_BACKOFF: Duration = Duration::from_millis(100);

/// Shared dependencies required by the job workers.
#[derive(Clone)]
pub struct JobWorkerContext {
    pub queue: Arc<JobQueue>,
    pub executor: Arc<ScanExecutor>,
    pub workflow: ScanWorkflow,
}

/// Errors surfaced while executing background jobs.
#[derive(thiserror::Error, Debug)]
pub enum JobProcessingError {
    #[error("Queue error: {0}")]
    Queue(#[from] JobQueueError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Failed to serialize job result: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Spawn a worker pool that claims queued jobs and processes them in the
/// background, at most `max_concurrent_jobs` at a time.
///
/// Cancelling `shutdown` stops claiming; the returned handle resolves once
/// in-flight jobs have finished.
pub fn spawn_job_worker_pool(
    context: JobWorkerContext,
    max_concurrent_jobs: usize,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    let concurrency = max_concurrent_jobs.max(1);
    let semaphore = Arc::new(Semaphore::new(concurrency));

    tokio::spawn(async move {
        info!("Job worker pool started with concurrency: {}", concurrency);

        loop {
            // Wait for a permit before claiming a job
            let permit = tokio::select! {
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(err) => {
                        error!(error = %err, "Failed to acquire concurrency permit for job processing");
                        break;
                    }
                },
                _ = shutdown.cancelled() => break,
            };

            tokio::select! {
                _ = context.queue.wait_until_ready() => {}
                _ = shutdown.cancelled() => break,
            }

            let job = match context.queue.try_claim().await {
                Ok(Some(job)) => job,
                // Claimed elsewhere in the meantime
                Ok(None) => continue,
                Err(err) => {
                    error!(error = %err, "Failed to claim job");
                    drop(permit);
                    tokio::select! {
                        _ = tokio::time::sleep(CLAIM_ERROR_BACKOFF) => continue,
                        _ = shutdown.cancelled() => break,
                    }
                }
            };

            let ctx = context.clone();
            tokio::spawn(async move {
                let job_id = job.id;
                if let Err(err) = process_job(ctx, job).await {
                    error!(job_id = %job_id, error = %err, "Background job processing failed");
                }
                drop(permit);
            });
        }

        info!("Job worker pool stopping, waiting for in-flight jobs");
        match semaphore.acquire_many(concurrency as u32).await {
            Ok(_drained) => info!("Job worker pool drained"),
            Err(err) => warn!(error = %err, "Job worker pool closed before draining"),
        }
    })
}

async fn process_job(ctx: JobWorkerContext, job: Job) -> Result<(), JobProcessingError> {
    let job_id = job.id;
    let scan_id = job.payload.scan_id;

    info!(
        job_id = %job_id,
        scan_id = %scan_id,
        scan_type = %job.payload.scan_type,
        attempt = job.attempts,
        max_attempts = job.max_attempts,
        "Processing scan job"
    );

    // Progress flows executor -> channel -> queue so status reads never wait
    // on the executor
    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
    let queue = ctx.queue.clone();
    let forwarder = tokio::spawn(async move {
        while let Some(progress) = progress_rx.recv().await {
            if let Err(e) = queue.update_progress(job_id, progress).await {
                debug!(job_id = %job_id, error = %e, "Dropped progress update");
            }
        }
    });

    let result = ctx.executor.execute(&job.payload, &progress_tx).await;
    drop(progress_tx);
    if let Err(e) = forwarder.await {
        warn!(job_id = %job_id, error = %e, "Progress forwarder ended abnormally");
    }

    match result {
        Ok(outcome) => {
            let skipped = outcome.skipped;
            let result = serde_json::to_value(&outcome)?;
            if let Err(err) =
                record_outcome(job_id, || ctx.queue.complete(job_id, result.clone())).await
            {
                return release(&ctx, job_id, err).await;
            }
            info!(
                job_id = %job_id,
                scan_id = %scan_id,
                skipped,
                findings = outcome.findings_persisted,
                "Scan job finished successfully"
            );
        }
        Err(err) => {
            let message = err.to_string();
            let failure = match record_outcome(job_id, || ctx.queue.fail(job_id, &message)).await {
                Ok(failure) => failure,
                Err(store_err) => return release(&ctx, job_id, store_err).await,
            };
            match failure {
                FailureOutcome::Retrying {
                    attempt,
                    delay,
                    next_attempt_at,
                } => {
                    warn!(
                        job_id = %job_id,
                        scan_id = %scan_id,
                        attempt,
                        retry_in_ms = delay.as_millis() as u64,
                        next_attempt_at = %next_attempt_at,
                        error = %err,
                        "Scan job failed, retry scheduled"
                    );
                }
                FailureOutcome::Exhausted { attempts } => {
                    error!(
                        job_id = %job_id,
                        scan_id = %scan_id,
                        attempts,
                        error = %err,
                        "Scan job failed, no attempts left"
                    );
                    ctx.workflow.fail_scan(scan_id, &message).await?;
                }
            }
        }
    }

    Ok(())
}

/// Run a queue transition, retrying with doubling backoff while the job
/// store rejects the write.
async fn record_outcome<T, F, Fut>(job_id: JobId, mut transition: F) -> Result<T, JobQueueError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, JobQueueError>>,
{
    let mut attempt = 1;
    loop {
        match transition().await {
            Err(JobQueueError::Store(e)) if attempt < RECORD_ATTEMPTS => {
                let delay = RECORD_BACKOFF * 2u32.pow(attempt - 1);
                warn!(
                    job_id = %job_id,
                    attempt,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %e,
                    "Failed to record job outcome, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}

/// Hand a job whose outcome could not be stored back to the queue so the
/// scan is not held by an active job nobody is running.
async fn release(
    ctx: &JobWorkerContext,
    job_id: JobId,
    err: JobQueueError,
) -> Result<(), JobProcessingError> {
    if matches!(err, JobQueueError::Store(_)) {
        let delay = ctx.queue.settings().backoff_base;
        let next_attempt_at = ctx.queue.release(job_id, delay).await?;
        warn!(
            job_id = %job_id,
            next_attempt_at = %next_attempt_at,
            "Job outcome not recorded, job released"
        );
    }
    Err(err.into())
}
