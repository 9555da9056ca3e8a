//! Session domain models

use super::common::StringUuid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Server-side session row.
///
/// Holds only the one-way hash of the bearer token; the raw value goes to
/// the transport boundary (cookie) and is never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub id: StringUuid,
    pub user_id: StringUuid,
    #[serde(skip_serializing)]
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Default for Session {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: StringUuid::new_v4(),
            user_id: StringUuid::new_v4(),
            token_hash: String::new(),
            expires_at: now,
            ip_address: None,
            user_agent: None,
            created_at: now,
        }
    }
}

/// Input for the session-issuance transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateSessionInput {
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Client metadata captured at the HTTP boundary for session records.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_hash_not_serialized() {
        let session = Session {
            token_hash: "deadbeef".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_string(&session).unwrap();
        assert!(!json.contains("deadbeef"));
        assert!(json.contains("expires_at"));
    }
}
