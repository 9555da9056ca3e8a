//! User credential domain model

use super::common::StringUuid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// User entity as seen by the credential store.
///
/// Mutated only through the lockout increment and the session-issuance
/// transaction; everything else about a user (profile, role contents)
/// belongs to other parts of the platform.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: StringUuid,
    /// Normalized (trimmed, lowercased) and unique.
    pub email: String,
    pub display_name: Option<String>,
    /// Argon2 PHC string. Never serialized to API responses.
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub failed_login_attempts: u32,
    pub locked_at: Option<DateTime<Utc>>,
    /// Sessions issued before this instant are invalid. Set together
    /// with `locked_at` when a lock triggers.
    pub sessions_invalid_before: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub email_verified_at: Option<DateTime<Utc>>,
    pub role_id: Option<StringUuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for User {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: StringUuid::new_v4(),
            email: String::new(),
            display_name: None,
            password_hash: String::new(),
            failed_login_attempts: 0,
            locked_at: None,
            sessions_invalid_before: None,
            is_active: true,
            email_verified_at: None,
            role_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl User {
    pub fn is_locked(&self) -> bool {
        self.locked_at.is_some()
    }
}

/// Outcome of the atomic increment-and-maybe-lock operation.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct LockoutState {
    pub failed_login_attempts: u32,
    pub locked_at: Option<DateTime<Utc>>,
}

impl LockoutState {
    pub fn is_locked(&self) -> bool {
        self.locked_at.is_some()
    }
}

/// Normalize an email address for lookup and storage.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
