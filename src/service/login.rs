//! Login orchestration
//!
//! Sequences lookup, lock and activity checks, password verification and
//! the lockout/session outcome. Every failure mode the caller can observe
//! collapses into the single invalid-credentials error; which one actually
//! happened is visible only in tracing and metrics.

use crate::config::AuthConfig;
use crate::domain::{
    normalize_email, CreateSessionInput, EmailJob, EnqueueOptions, RequestMeta, Session, User,
};
use crate::error::{AppError, Result};
use crate::repository::{CredentialRepository, JobRepository};
use argon2::{
    password_hash::{PasswordHash, PasswordVerifier},
    Argon2,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use metrics::counter;
use rand::Rng;
use sha2::Sha256;
use std::sync::Arc;
use tracing::{debug, warn};

type HmacSha256 = Hmac<Sha256>;

/// A freshly issued session together with the raw bearer token.
///
/// The token exists only here and in the response cookie; the session row
/// carries its hash.
#[derive(Debug)]
pub struct IssuedSession {
    pub session: Session,
    pub token: String,
}

/// Generate the opaque session token handed to the client.
pub fn generate_session_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Keyed one-way hash of a bearer token, hex encoded.
pub fn hash_token(token: &str, key: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("invalid token hash key: {}", e)))?;
    mac.update(token.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn verify_password(password: &str, stored_hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("malformed stored password hash: {}", e)))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AppError::Internal(anyhow::anyhow!(
            "password verification failed: {}",
            e
        ))),
    }
}

pub struct LoginService<C: CredentialRepository, J: JobRepository> {
    credentials: Arc<C>,
    jobs: Arc<J>,
    config: AuthConfig,
}

impl<C: CredentialRepository, J: JobRepository> LoginService<C, J> {
    pub fn new(credentials: Arc<C>, jobs: Arc<J>, config: AuthConfig) -> Self {
        Self {
            credentials,
            jobs,
            config,
        }
    }

    /// Authenticate a user and issue a session.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        meta: RequestMeta,
    ) -> Result<IssuedSession> {
        let email = normalize_email(email);

        let user = match self.credentials.find_by_email(&email).await? {
            Some(user) => user,
            None => {
                debug!("login rejected: no user for submitted email");
                counter!("assure_login_attempts_total", "outcome" => "unknown_user").increment(1);
                return Err(AppError::InvalidCredentials);
            }
        };

        if !user.is_active {
            debug!(user_id = %user.id, "login rejected: account inactive");
            counter!("assure_login_attempts_total", "outcome" => "inactive").increment(1);
            return Err(AppError::InvalidCredentials);
        }

        if user.is_locked() {
            debug!(user_id = %user.id, "login rejected: account locked");
            counter!("assure_login_attempts_total", "outcome" => "locked").increment(1);
            return Err(AppError::InvalidCredentials);
        }

        if !verify_password(password, &user.password_hash)? {
            return Err(self.register_failed_attempt(&user).await?);
        }

        let issued = self.issue_session(&user, meta).await?;
        counter!("assure_login_attempts_total", "outcome" => "success").increment(1);
        Ok(issued)
    }

    /// Record a wrong password via the atomic increment and map the result
    /// onto the generic failure. Returns the error to raise so the caller
    /// cannot forget to fail.
    async fn register_failed_attempt(&self, user: &User) -> Result<AppError> {
        let state = self
            .credentials
            .increment_failed_attempts(user.id, self.config.max_failed_attempts)
            .await
            .map_err(|e| match e {
                // The user existed a moment ago; treat disappearance as an
                // integrity violation, not a client error.
                AppError::NotFound(_) => AppError::Internal(anyhow::anyhow!(
                    "user {} vanished during failed-attempt tracking",
                    user.id
                )),
                other => other,
            })?;

        counter!("assure_login_attempts_total", "outcome" => "wrong_password").increment(1);

        // Only the call that crossed the threshold observes the counter at
        // exactly the limit with the lock set; that caller owns the
        // notification. The client response is the same either way.
        if state.is_locked() && state.failed_login_attempts == self.config.max_failed_attempts {
            counter!("assure_account_lockouts_total").increment(1);
            debug!(user_id = %user.id, "account locked after repeated failures");

            let notify = EmailJob::AccountLocked {
                to: user.email.clone(),
                name: user
                    .display_name
                    .clone()
                    .unwrap_or_else(|| user.email.clone()),
            };
            if let Err(e) = self.jobs.enqueue(&notify, &EnqueueOptions::default()).await {
                warn!(user_id = %user.id, error = %e, "failed to enqueue account-locked email");
            }
        }

        Ok(AppError::InvalidCredentials)
    }

    async fn issue_session(&self, user: &User, meta: RequestMeta) -> Result<IssuedSession> {
        let token = generate_session_token();
        let token_hash = hash_token(&token, self.config.token_hmac_key.as_bytes())?;
        let expires_at = Utc::now() + Duration::seconds(self.config.session_ttl_secs);

        let input = CreateSessionInput {
            token_hash,
            expires_at,
            ip_address: meta.ip_address,
            user_agent: meta.user_agent,
        };

        let session = self
            .credentials
            .create_session_and_reset_attempts(user.id, &input)
            .await
            .map_err(|e| match e {
                AppError::NotFound(_) => AppError::Internal(anyhow::anyhow!(
                    "user {} vanished during session issuance",
                    user.id
                )),
                other => other,
            })?;

        Ok(IssuedSession { session, token })
    }
}
