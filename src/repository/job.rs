//! Job queue repository
//!
//! MySQL-backed work queue with at-least-once delivery. Claiming uses
//! `FOR UPDATE SKIP LOCKED` so exactly one worker holds an in-flight job;
//! a lease stamp plus the release pass makes jobs redeliverable when a
//! worker dies without acknowledging.

use crate::domain::{EmailJob, EnqueueOptions, Job, StringUuid};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::MySqlPool;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Enqueue a job; the returned row is the caller's handle.
    async fn enqueue(&self, job: &EmailJob, options: &EnqueueOptions) -> Result<Job>;

    /// Claim the next due waiting job, marking it active for `lease`.
    /// Returns `None` when nothing is due.
    async fn claim_next(&self, lease: Duration) -> Result<Option<Job>>;

    /// Acknowledge successful processing.
    async fn complete(&self, job_id: StringUuid) -> Result<()>;

    /// Put a job back in the waiting state, due at `run_at`.
    async fn reschedule(
        &self,
        job_id: StringUuid,
        run_at: DateTime<Utc>,
        error: &str,
    ) -> Result<()>;

    /// Mark a job failed; the row is retained for inspection.
    async fn fail(&self, job_id: StringUuid, error: &str) -> Result<()>;

    /// Return active jobs whose lease expired to the waiting state.
    async fn release_expired(&self) -> Result<u64>;

    async fn find_by_id(&self, job_id: StringUuid) -> Result<Option<Job>>;
}

const JOB_COLUMNS: &str = "id, job_type, payload, status, attempts, max_attempts, run_at, \
     lease_expires_at, last_error, created_at, updated_at, completed_at";

pub struct JobRepositoryImpl {
    pool: MySqlPool,
}

impl JobRepositoryImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobRepository for JobRepositoryImpl {
    async fn enqueue(&self, job: &EmailJob, options: &EnqueueOptions) -> Result<Job> {
        let id = StringUuid::new_v4();
        let payload = serde_json::to_value(job).map_err(|e| AppError::Internal(e.into()))?;
        let run_at = Utc::now() + options.delay;

        sqlx::query(
            r#"
            INSERT INTO jobs (id, job_type, payload, status, attempts, max_attempts, run_at, created_at, updated_at)
            VALUES (?, ?, ?, 'waiting', 0, ?, ?, NOW(6), NOW(6))
            "#,
        )
        .bind(id)
        .bind(job.job_type())
        .bind(payload)
        .bind(options.max_attempts)
        .bind(run_at)
        .execute(&self.pool)
        .await?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to enqueue job")))
    }

    async fn claim_next(&self, lease: Duration) -> Result<Option<Job>> {
        let mut tx = self.pool.begin().await?;

        let job = sqlx::query_as::<_, Job>(&format!(
            r#"
            SELECT {JOB_COLUMNS} FROM jobs
            WHERE status = 'waiting' AND run_at <= NOW(6)
            ORDER BY run_at
            LIMIT 1
            FOR UPDATE SKIP LOCKED
            "#
        ))
        .fetch_optional(&mut *tx)
        .await?;

        let Some(mut job) = job else {
            tx.commit().await?;
            return Ok(None);
        };

        let lease_expires_at = Utc::now() + lease;

        sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'active', attempts = attempts + 1,
                lease_expires_at = ?, updated_at = NOW(6)
            WHERE id = ?
            "#,
        )
        .bind(lease_expires_at)
        .bind(job.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        job.status = crate::domain::JobStatus::Active;
        job.attempts += 1;
        job.lease_expires_at = Some(lease_expires_at);

        Ok(Some(job))
    }

    async fn complete(&self, job_id: StringUuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'completed', completed_at = NOW(6),
                lease_expires_at = NULL, updated_at = NOW(6)
            WHERE id = ?
            "#,
        )
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn reschedule(
        &self,
        job_id: StringUuid,
        run_at: DateTime<Utc>,
        error: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'waiting', run_at = ?, last_error = ?,
                lease_expires_at = NULL, updated_at = NOW(6)
            WHERE id = ?
            "#,
        )
        .bind(run_at)
        .bind(error)
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn fail(&self, job_id: StringUuid, error: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'failed', last_error = ?,
                lease_expires_at = NULL, updated_at = NOW(6)
            WHERE id = ?
            "#,
        )
        .bind(error)
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn release_expired(&self) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'waiting', lease_expires_at = NULL, updated_at = NOW(6)
            WHERE status = 'active' AND lease_expires_at < NOW(6)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn find_by_id(&self, job_id: StringUuid) -> Result<Option<Job>> {
        let job = sqlx::query_as::<_, Job>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?"
        ))
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::JobStatus;
    use mockall::predicate::*;

    #[tokio::test]
    async fn test_mock_enqueue_returns_handle() {
        let mut mock = MockJobRepository::new();

        mock.expect_enqueue().returning(|job, options| {
            Ok(Job {
                job_type: job.job_type().to_string(),
                payload: serde_json::to_value(job).unwrap(),
                max_attempts: options.max_attempts,
                ..Default::default()
            })
        });

        let job = EmailJob::Welcome {
            to: "new.client@example.com".to_string(),
            name: "New Client".to_string(),
        };
        let handle = mock.enqueue(&job, &EnqueueOptions::default()).await.unwrap();
        assert_eq!(handle.job_type, "welcome");
        assert_eq!(handle.status, JobStatus::Waiting);
    }

    #[tokio::test]
    async fn test_mock_claim_none_when_empty() {
        let mut mock = MockJobRepository::new();

        mock.expect_claim_next().returning(|_| Ok(None));

        let claimed = mock.claim_next(Duration::seconds(60)).await.unwrap();
        assert!(claimed.is_none());
    }

    #[tokio::test]
    async fn test_mock_release_expired() {
        let mut mock = MockJobRepository::new();

        mock.expect_release_expired().returning(|| Ok(3));

        assert_eq!(mock.release_expired().await.unwrap(), 3);
    }
}
