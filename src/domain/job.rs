//! Background job domain models

use super::common::StringUuid;
use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Delivery state of a queued job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Waiting,
    Active,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The closed set of transactional email jobs.
///
/// Adding a variant without wiring its template fails to compile; an
/// unrecognized `type` tag in a stored payload fails decoding with a
/// non-retryable error instead of being silently skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum EmailJob {
    Verification {
        to: String,
        name: String,
        verify_url: String,
    },
    PasswordReset {
        to: String,
        name: String,
        reset_url: String,
    },
    Welcome {
        to: String,
        name: String,
    },
    AccountLocked {
        to: String,
        name: String,
    },
    Invitation {
        to: String,
        inviter_name: String,
        invite_url: String,
    },
}

impl EmailJob {
    /// Stable type tag, stored alongside the payload for querying.
    pub fn job_type(&self) -> &'static str {
        match self {
            Self::Verification { .. } => "verification",
            Self::PasswordReset { .. } => "password-reset",
            Self::Welcome { .. } => "welcome",
            Self::AccountLocked { .. } => "account-locked",
            Self::Invitation { .. } => "invitation",
        }
    }

    pub fn recipient(&self) -> &str {
        match self {
            Self::Verification { to, .. }
            | Self::PasswordReset { to, .. }
            | Self::Welcome { to, .. }
            | Self::AccountLocked { to, .. }
            | Self::Invitation { to, .. } => to,
        }
    }
}

/// A queued unit of work. The id doubles as the idempotency key for the
/// job's external side effect.
#[derive(Debug, Clone, FromRow)]
pub struct Job {
    pub id: StringUuid,
    pub job_type: String,
    pub payload: serde_json::Value,
    pub status: JobStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    pub run_at: DateTime<Utc>,
    pub lease_expires_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Decode the stored payload into the closed job enumeration.
    ///
    /// A payload that does not match any known type is a configuration
    /// error: the caller must fail the job, not skip it.
    pub fn decode_payload(&self) -> Result<EmailJob> {
        serde_json::from_value(self.payload.clone()).map_err(|e| {
            AppError::Validation(format!(
                "job {} has invalid '{}' payload: {}",
                self.id, self.job_type, e
            ))
        })
    }
}

impl Default for Job {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: StringUuid::new_v4(),
            job_type: String::new(),
            payload: serde_json::Value::Null,
            status: JobStatus::Waiting,
            attempts: 0,
            max_attempts: 5,
            run_at: now,
            lease_expires_at: None,
            last_error: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }
}

/// Options accepted by the enqueue interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnqueueOptions {
    pub max_attempts: u32,
    /// Delay before the job becomes claimable.
    pub delay: chrono::Duration,
}

impl Default for EnqueueOptions {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: chrono::Duration::zero(),
        }
    }
}

/// Proof that the external send for a job id already completed.
///
/// Written once, after the transport confirmed the send; its presence turns
/// a redelivery into a no-op.
#[derive(Debug, Clone, FromRow)]
pub struct SentReceipt {
    pub job_id: StringUuid,
    pub sent_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_email_job_tags() {
        let job = EmailJob::PasswordReset {
            to: "agent@example.com".to_string(),
            name: "Agent".to_string(),
            reset_url: "https://app.example.com/reset/abc".to_string(),
        };
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["type"], "password-reset");
        assert_eq!(value["data"]["to"], "agent@example.com");
        assert_eq!(job.job_type(), "password-reset");
    }

    #[test]
    fn test_decode_payload_roundtrip() {
        let email_job = EmailJob::AccountLocked {
            to: "client@example.com".to_string(),
            name: "Client".to_string(),
        };
        let job = Job {
            job_type: email_job.job_type().to_string(),
            payload: serde_json::to_value(&email_job).unwrap(),
            ..Default::default()
        };
        assert_eq!(job.decode_payload().unwrap(), email_job);
    }

    #[test]
    fn test_decode_unknown_type_fails_fast() {
        let job = Job {
            job_type: "carrier-sync".to_string(),
            payload: serde_json::json!({"type": "carrier-sync", "data": {"to": "x@example.com"}}),
            ..Default::default()
        };
        let err = job.decode_payload().unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_decode_missing_field_fails() {
        let job = Job {
            job_type: "verification".to_string(),
            // verify_url missing
            payload: serde_json::json!({"type": "verification", "data": {"to": "x@example.com", "name": "X"}}),
            ..Default::default()
        };
        assert!(job.decode_payload().is_err());
    }

    #[test]
    fn test_recipient() {
        let job = EmailJob::Invitation {
            to: "new.agent@example.com".to_string(),
            inviter_name: "Office Manager".to_string(),
            invite_url: "https://app.example.com/invite/xyz".to_string(),
        };
        assert_eq!(job.recipient(), "new.agent@example.com");
    }

    #[test]
    fn test_job_status_display() {
        assert_eq!(JobStatus::Waiting.to_string(), "waiting");
        assert_eq!(JobStatus::Failed.to_string(), "failed");
    }
}
