//! Credential repository
//!
//! Owns the user lockout state and session rows. The lockout transition and
//! the session-issuance/attempts-reset pair are exposed only as atomic
//! primitives; callers cannot observe or create intermediate states.

use crate::domain::{CreateSessionInput, LockoutState, Session, StringUuid, User};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use sqlx::MySqlPool;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialRepository: Send + Sync {
    /// Look up a user by normalized email.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Atomically increment the failed-attempt counter and, when the new
    /// value reaches `max_attempts` on a not-yet-locked account, set
    /// `locked_at` and `sessions_invalid_before` in the same statement.
    ///
    /// Concurrent callers serialize on the row lock: no increment is ever
    /// lost, and only the first crosser sets the lock.
    async fn increment_failed_attempts(
        &self,
        user_id: StringUuid,
        max_attempts: u32,
    ) -> Result<LockoutState>;

    /// Unconditionally zero the failed-attempt counter.
    async fn reset_failed_attempts(&self, user_id: StringUuid) -> Result<()>;

    /// Insert a session row and zero the failed-attempt counter inside one
    /// transaction; either both happen or neither does.
    async fn create_session_and_reset_attempts(
        &self,
        user_id: StringUuid,
        input: &CreateSessionInput,
    ) -> Result<Session>;
}

const USER_COLUMNS: &str = "id, email, display_name, password_hash, failed_login_attempts, \
     locked_at, sessions_invalid_before, is_active, email_verified_at, role_id, created_at, \
     updated_at";

const SESSION_COLUMNS: &str =
    "id, user_id, token_hash, expires_at, ip_address, user_agent, created_at";

pub struct CredentialRepositoryImpl {
    pool: MySqlPool,
}

impl CredentialRepositoryImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialRepository for CredentialRepositoryImpl {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = ?"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn increment_failed_attempts(
        &self,
        user_id: StringUuid,
        max_attempts: u32,
    ) -> Result<LockoutState> {
        let mut tx = self.pool.begin().await?;

        // Single conditional UPDATE, never a read followed by a write.
        // MySQL applies SET clauses left to right and later clauses see the
        // new values, so the two lock columns must be assigned before the
        // counter (they reference `failed_login_attempts + 1`) and
        // `sessions_invalid_before` before `locked_at` (it checks the
        // pre-update `locked_at IS NULL`).
        let result = sqlx::query(
            r#"
            UPDATE users
            SET sessions_invalid_before =
                    IF(failed_login_attempts + 1 >= ? AND locked_at IS NULL,
                       NOW(6), sessions_invalid_before),
                locked_at =
                    IF(failed_login_attempts + 1 >= ? AND locked_at IS NULL,
                       NOW(6), locked_at),
                failed_login_attempts = failed_login_attempts + 1,
                updated_at = NOW(6)
            WHERE id = ?
            "#,
        )
        .bind(max_attempts)
        .bind(max_attempts)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User {} not found", user_id)));
        }

        let state = sqlx::query_as::<_, LockoutState>(
            "SELECT failed_login_attempts, locked_at FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(state)
    }

    async fn reset_failed_attempts(&self, user_id: StringUuid) -> Result<()> {
        let result = sqlx::query(
            "UPDATE users SET failed_login_attempts = 0, updated_at = NOW(6) WHERE id = ?",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User {} not found", user_id)));
        }

        Ok(())
    }

    async fn create_session_and_reset_attempts(
        &self,
        user_id: StringUuid,
        input: &CreateSessionInput,
    ) -> Result<Session> {
        let id = StringUuid::new_v4();
        let mut tx = self.pool.begin().await?;

        let reset = sqlx::query(
            "UPDATE users SET failed_login_attempts = 0, updated_at = NOW(6) WHERE id = ?",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        if reset.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User {} not found", user_id)));
        }

        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, token_hash, expires_at, ip_address, user_agent, created_at)
            VALUES (?, ?, ?, ?, ?, ?, NOW(6))
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(&input.token_hash)
        .bind(input.expires_at)
        .bind(&input.ip_address)
        .bind(&input.user_agent)
        .execute(&mut *tx)
        .await?;

        let session = sqlx::query_as::<_, Session>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?"
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mockall::predicate::*;

    #[tokio::test]
    async fn test_mock_find_by_email() {
        let mut mock = MockCredentialRepository::new();

        mock.expect_find_by_email()
            .with(eq("broker@example.com"))
            .returning(|email| {
                Ok(Some(User {
                    email: email.to_string(),
                    ..Default::default()
                }))
            });

        let user = mock.find_by_email("broker@example.com").await.unwrap();
        assert_eq!(user.unwrap().email, "broker@example.com");
    }

    #[tokio::test]
    async fn test_mock_increment_reports_lock() {
        let mut mock = MockCredentialRepository::new();
        let user_id = StringUuid::new_v4();

        mock.expect_increment_failed_attempts()
            .with(eq(user_id), eq(5u32))
            .returning(|_, max| {
                Ok(LockoutState {
                    failed_login_attempts: max,
                    locked_at: Some(Utc::now()),
                })
            });

        let state = mock.increment_failed_attempts(user_id, 5).await.unwrap();
        assert_eq!(state.failed_login_attempts, 5);
        assert!(state.is_locked());
    }

    #[tokio::test]
    async fn test_mock_reset_failed_attempts() {
        let mut mock = MockCredentialRepository::new();
        let user_id = StringUuid::new_v4();

        mock.expect_reset_failed_attempts()
            .with(eq(user_id))
            .times(1)
            .returning(|_| Ok(()));

        mock.reset_failed_attempts(user_id).await.unwrap();
    }

    #[tokio::test]
    async fn test_mock_create_session_carries_input() {
        let mut mock = MockCredentialRepository::new();
        let user_id = StringUuid::new_v4();
        let expires_at = Utc::now() + chrono::Duration::hours(24);

        mock.expect_create_session_and_reset_attempts()
            .returning(move |uid, input| {
                Ok(Session {
                    user_id: uid,
                    token_hash: input.token_hash.clone(),
                    expires_at: input.expires_at,
                    ip_address: input.ip_address.clone(),
                    user_agent: input.user_agent.clone(),
                    ..Default::default()
                })
            });

        let input = CreateSessionInput {
            token_hash: "abc123".to_string(),
            expires_at,
            ip_address: Some("203.0.113.9".to_string()),
            user_agent: Some("Mozilla/5.0".to_string()),
        };

        let session = mock
            .create_session_and_reset_attempts(user_id, &input)
            .await
            .unwrap();
        assert_eq!(session.user_id, user_id);
        assert_eq!(session.token_hash, "abc123");
        assert_eq!(session.expires_at, expires_at);
    }
}
