//! Idempotent email dispatch
//!
//! One delivered job becomes at most one externally observable send. The
//! receipt check runs before the transport; the receipt write runs after
//! it, so a crash anywhere in between can repeat a send but never lose one.

use crate::domain::{EmailAddress, EmailMessage, Job};
use crate::email::templates::render_job;
use crate::email::EmailProvider;
use crate::error::{AppError, Result};
use crate::repository::ReceiptRepository;
use metrics::counter;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What happened to a delivered job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The transport was invoked and confirmed the send.
    Sent,
    /// A receipt already existed; the transport was not invoked.
    AlreadySent,
}

pub struct EmailDispatcher<R: ReceiptRepository, P: EmailProvider> {
    receipts: Arc<R>,
    provider: Arc<P>,
}

impl<R: ReceiptRepository, P: EmailProvider> EmailDispatcher<R, P> {
    pub fn new(receipts: Arc<R>, provider: Arc<P>) -> Self {
        Self { receipts, provider }
    }

    /// Process one delivery of a job.
    ///
    /// Errors bubble to the worker, which owns the retry decision; this
    /// method never reschedules anything itself.
    pub async fn dispatch(&self, job: &Job) -> Result<DispatchOutcome> {
        if let Some(receipt) = self.receipts.find(job.id).await? {
            debug!(job_id = %job.id, sent_at = %receipt.sent_at, "send already recorded, skipping");
            counter!("assure_emails_suppressed_total").increment(1);
            return Ok(DispatchOutcome::AlreadySent);
        }

        // A payload that fails here is a configuration error; the worker
        // marks the job failed without retrying.
        let email_job = job.decode_payload()?;
        let rendered = render_job(&email_job);

        let message = EmailMessage::new(
            EmailAddress::new(email_job.recipient()),
            rendered.subject,
            rendered.html_body,
        )
        .with_text_body(rendered.text_body);

        self.provider.send(&message).await.map_err(|e| {
            AppError::ServiceUnavailable(format!("email transport ({}): {}", job.job_type, e))
        })?;

        info!(job_id = %job.id, job_type = %job.job_type, "email sent");
        counter!("assure_emails_sent_total", "job_type" => job.job_type.clone()).increment(1);

        // The send already happened; losing the receipt only risks one
        // extra send on a later redelivery, so log and move on.
        if let Err(e) = self.receipts.record(job.id).await {
            warn!(job_id = %job.id, error = %e, "sent-receipt write failed; redelivery may resend");
        }

        Ok(DispatchOutcome::Sent)
    }
}
