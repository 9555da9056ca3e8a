//! Sent-receipt repository
//!
//! Keyed store proving which job ids already produced their external send.
//! A fast existence check here is what makes redelivery idempotent.

use crate::domain::{SentReceipt, StringUuid};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use sqlx::MySqlPool;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReceiptRepository: Send + Sync {
    async fn find(&self, job_id: StringUuid) -> Result<Option<SentReceipt>>;

    /// Record that the send for `job_id` completed. Written only after the
    /// transport confirmed success.
    async fn record(&self, job_id: StringUuid) -> Result<SentReceipt>;
}

pub struct ReceiptRepositoryImpl {
    pool: MySqlPool,
}

impl ReceiptRepositoryImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReceiptRepository for ReceiptRepositoryImpl {
    async fn find(&self, job_id: StringUuid) -> Result<Option<SentReceipt>> {
        let receipt = sqlx::query_as::<_, SentReceipt>(
            "SELECT job_id, sent_at FROM email_receipts WHERE job_id = ?",
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(receipt)
    }

    async fn record(&self, job_id: StringUuid) -> Result<SentReceipt> {
        sqlx::query("INSERT INTO email_receipts (job_id, sent_at) VALUES (?, NOW(6))")
            .bind(job_id)
            .execute(&self.pool)
            .await?;

        self.find(job_id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to record sent receipt")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mockall::predicate::*;

    #[tokio::test]
    async fn test_mock_find_absent() {
        let mut mock = MockReceiptRepository::new();
        let job_id = StringUuid::new_v4();

        mock.expect_find().with(eq(job_id)).returning(|_| Ok(None));

        assert!(mock.find(job_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mock_record() {
        let mut mock = MockReceiptRepository::new();
        let job_id = StringUuid::new_v4();

        mock.expect_record().with(eq(job_id)).returning(|id| {
            Ok(SentReceipt {
                job_id: id,
                sent_at: Utc::now(),
            })
        });

        let receipt = mock.record(job_id).await.unwrap();
        assert_eq!(receipt.job_id, job_id);
    }
}
