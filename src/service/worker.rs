//! Background job worker
//!
//! Claims due jobs one at a time, hands each to the dispatcher and
//! acknowledges the result. Retry pacing lives here: transient failures go
//! back to the queue under bounded exponential backoff, non-retryable ones
//! and exhausted jobs are marked failed and retained.

use crate::config::WorkerConfig;
use crate::domain::Job;
use crate::email::EmailProvider;
use crate::error::Result;
use crate::repository::{JobRepository, ReceiptRepository};
use crate::service::dispatch::EmailDispatcher;
use chrono::Utc;
use metrics::counter;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Bounded exponential backoff: `base * 2^(attempt-1)`, capped.
pub fn backoff_delay(attempt: u32, base_secs: i64, cap_secs: i64) -> chrono::Duration {
    let exponent = attempt.saturating_sub(1).min(20);
    let secs = base_secs.saturating_mul(1i64 << exponent).min(cap_secs);
    chrono::Duration::seconds(secs)
}

pub struct JobWorker<J: JobRepository, R: ReceiptRepository, P: EmailProvider> {
    jobs: Arc<J>,
    dispatcher: EmailDispatcher<R, P>,
    config: WorkerConfig,
}

impl<J: JobRepository, R: ReceiptRepository, P: EmailProvider> JobWorker<J, R, P> {
    pub fn new(jobs: Arc<J>, dispatcher: EmailDispatcher<R, P>, config: WorkerConfig) -> Self {
        Self {
            jobs,
            dispatcher,
            config,
        }
    }

    /// Run until the shutdown channel flips.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!("job worker started");
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("job worker stopping");
                    break;
                }
                _ = self.tick() => {}
            }
        }
    }

    async fn tick(&self) {
        match self.jobs.release_expired().await {
            Ok(0) => {}
            Ok(released) => {
                warn!(released, "returned expired in-flight jobs to the queue");
                counter!("assure_jobs_released_total").increment(released);
            }
            Err(e) => warn!(error = %e, "failed to release expired jobs"),
        }

        match self.run_once().await {
            // Something was processed; look for more work immediately
            Ok(true) => {}
            Ok(false) => self.idle_sleep().await,
            Err(e) => {
                error!(error = %e, "worker iteration failed");
                self.idle_sleep().await;
            }
        }
    }

    async fn idle_sleep(&self) {
        tokio::time::sleep(std::time::Duration::from_secs(self.config.poll_interval_secs)).await;
    }

    /// Claim and process at most one job. Returns whether a job was claimed.
    pub async fn run_once(&self) -> Result<bool> {
        let lease = chrono::Duration::seconds(self.config.visibility_timeout_secs);
        let Some(job) = self.jobs.claim_next(lease).await? else {
            return Ok(false);
        };

        debug!(job_id = %job.id, job_type = %job.job_type, attempt = job.attempts, "processing job");
        self.process(&job).await?;
        Ok(true)
    }

    async fn process(&self, job: &Job) -> Result<()> {
        match self.dispatcher.dispatch(job).await {
            Ok(outcome) => {
                debug!(job_id = %job.id, ?outcome, "job completed");
                counter!("assure_jobs_processed_total", "result" => "completed").increment(1);
                self.jobs.complete(job.id).await
            }
            Err(err) if !err.is_retryable() => {
                error!(job_id = %job.id, error = %err, "job failed permanently");
                counter!("assure_jobs_processed_total", "result" => "failed").increment(1);
                self.jobs.fail(job.id, &err.to_string()).await
            }
            Err(err) if job.attempts >= job.max_attempts => {
                error!(
                    job_id = %job.id,
                    attempts = job.attempts,
                    error = %err,
                    "job failed after exhausting attempts"
                );
                counter!("assure_jobs_processed_total", "result" => "failed").increment(1);
                self.jobs.fail(job.id, &err.to_string()).await
            }
            Err(err) => {
                let delay = backoff_delay(
                    job.attempts,
                    self.config.backoff_base_secs,
                    self.config.backoff_cap_secs,
                );
                warn!(
                    job_id = %job.id,
                    attempt = job.attempts,
                    retry_in_secs = delay.num_seconds(),
                    error = %err,
                    "job failed, rescheduling"
                );
                counter!("assure_jobs_processed_total", "result" => "retried").increment(1);
                self.jobs
                    .reschedule(job.id, Utc::now() + delay, &err.to_string())
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EmailJob, EmailSendResult, JobStatus, SentReceipt};
    use crate::email::provider::{EmailProviderError, MockEmailProvider};
    use crate::repository::job::MockJobRepository;
    use crate::repository::receipt::MockReceiptRepository;
    use mockall::predicate::*;
    use rstest::rstest;

    fn worker_config() -> WorkerConfig {
        WorkerConfig {
            poll_interval_secs: 1,
            visibility_timeout_secs: 60,
            max_attempts: 5,
            backoff_base_secs: 5,
            backoff_cap_secs: 300,
        }
    }

    fn claimed_job(attempts: u32) -> Job {
        let email_job = EmailJob::Verification {
            to: "new.user@example.com".to_string(),
            name: "New User".to_string(),
            verify_url: "https://app.assure.example/verify/tok".to_string(),
        };
        Job {
            job_type: email_job.job_type().to_string(),
            payload: serde_json::to_value(&email_job).unwrap(),
            status: JobStatus::Active,
            attempts,
            max_attempts: 5,
            ..Default::default()
        }
    }

    fn worker(
        jobs: MockJobRepository,
        receipts: MockReceiptRepository,
        provider: MockEmailProvider,
    ) -> JobWorker<MockJobRepository, MockReceiptRepository, MockEmailProvider> {
        let dispatcher = EmailDispatcher::new(Arc::new(receipts), Arc::new(provider));
        JobWorker::new(Arc::new(jobs), dispatcher, worker_config())
    }

    #[rstest]
    #[case(1, 5)]
    #[case(2, 10)]
    #[case(3, 20)]
    #[case(4, 40)]
    #[case(7, 300)]
    #[case(60, 300)]
    fn test_backoff_is_bounded_exponential(#[case] attempt: u32, #[case] expected_secs: i64) {
        assert_eq!(
            backoff_delay(attempt, 5, 300),
            chrono::Duration::seconds(expected_secs)
        );
    }

    #[tokio::test]
    async fn test_run_once_idle() {
        let mut jobs = MockJobRepository::new();
        let receipts = MockReceiptRepository::new();
        let provider = MockEmailProvider::new();

        jobs.expect_claim_next().returning(|_| Ok(None));

        let processed = worker(jobs, receipts, provider).run_once().await.unwrap();
        assert!(!processed);
    }

    #[tokio::test]
    async fn test_successful_job_is_completed() {
        let mut jobs = MockJobRepository::new();
        let mut receipts = MockReceiptRepository::new();
        let mut provider = MockEmailProvider::new();
        let job = claimed_job(1);
        let job_id = job.id;

        jobs.expect_claim_next()
            .returning(move |_| Ok(Some(job.clone())));
        receipts.expect_find().returning(|_| Ok(None));
        provider
            .expect_send()
            .returning(|_| Ok(EmailSendResult::success(None)));
        receipts.expect_record().returning(|id| {
            Ok(SentReceipt {
                job_id: id,
                sent_at: Utc::now(),
            })
        });
        jobs.expect_complete()
            .with(eq(job_id))
            .times(1)
            .returning(|_| Ok(()));

        let processed = worker(jobs, receipts, provider).run_once().await.unwrap();
        assert!(processed);
    }

    #[tokio::test]
    async fn test_transient_failure_reschedules_with_backoff() {
        let mut jobs = MockJobRepository::new();
        let mut receipts = MockReceiptRepository::new();
        let mut provider = MockEmailProvider::new();
        let job = claimed_job(2);
        let job_id = job.id;

        jobs.expect_claim_next()
            .returning(move |_| Ok(Some(job.clone())));
        receipts.expect_find().returning(|_| Ok(None));
        provider
            .expect_send()
            .returning(|_| Err(EmailProviderError::ConnectionError("timeout".to_string())));
        jobs.expect_reschedule()
            .withf(move |id, run_at, error| {
                // attempt 2 with base 5 → 10s delay
                let delay = *run_at - Utc::now();
                *id == job_id
                    && delay > chrono::Duration::seconds(8)
                    && delay <= chrono::Duration::seconds(10)
                    && error.contains("timeout")
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let processed = worker(jobs, receipts, provider).run_once().await.unwrap();
        assert!(processed);
    }

    #[tokio::test]
    async fn test_exhausted_attempts_fail_the_job() {
        let mut jobs = MockJobRepository::new();
        let mut receipts = MockReceiptRepository::new();
        let mut provider = MockEmailProvider::new();
        let job = claimed_job(5);
        let job_id = job.id;

        jobs.expect_claim_next()
            .returning(move |_| Ok(Some(job.clone())));
        receipts.expect_find().returning(|_| Ok(None));
        provider
            .expect_send()
            .returning(|_| Err(EmailProviderError::SendFailed("rejected".to_string())));
        jobs.expect_fail()
            .with(eq(job_id), always())
            .times(1)
            .returning(|_, _| Ok(()));

        worker(jobs, receipts, provider).run_once().await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_payload_fails_without_retry() {
        let mut jobs = MockJobRepository::new();
        let mut receipts = MockReceiptRepository::new();
        let provider = MockEmailProvider::new();
        let job = Job {
            job_type: "carrier-sync".to_string(),
            payload: serde_json::json!({"type": "carrier-sync", "data": {}}),
            status: JobStatus::Active,
            attempts: 1,
            max_attempts: 5,
            ..Default::default()
        };
        let job_id = job.id;

        jobs.expect_claim_next()
            .returning(move |_| Ok(Some(job.clone())));
        receipts.expect_find().returning(|_| Ok(None));
        // First attempt, but no reschedule: the payload will never decode
        jobs.expect_fail()
            .with(eq(job_id), always())
            .times(1)
            .returning(|_, _| Ok(()));

        worker(jobs, receipts, provider).run_once().await.unwrap();
    }

    #[tokio::test]
    async fn test_redelivered_job_with_receipt_completes_without_send() {
        let mut jobs = MockJobRepository::new();
        let mut receipts = MockReceiptRepository::new();
        let provider = MockEmailProvider::new();
        let job = claimed_job(2);
        let job_id = job.id;

        jobs.expect_claim_next()
            .returning(move |_| Ok(Some(job.clone())));
        receipts.expect_find().returning(|id| {
            Ok(Some(SentReceipt {
                job_id: id,
                sent_at: Utc::now(),
            }))
        });
        jobs.expect_complete()
            .with(eq(job_id))
            .times(1)
            .returning(|_| Ok(()));

        let processed = worker(jobs, receipts, provider).run_once().await.unwrap();
        assert!(processed);
    }
}
