//! Configuration management for Assure Core

use anyhow::{Context, Result};
use std::env;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server host
    pub http_host: String,
    /// HTTP server port
    pub http_port: u16,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Authentication and lockout configuration
    pub auth: AuthConfig,
    /// SMTP transport configuration
    pub smtp: SmtpConfig,
    /// Background worker configuration
    pub worker: WorkerConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Failed attempts at which an account locks
    pub max_failed_attempts: u32,
    /// Session lifetime in seconds
    pub session_ttl_secs: i64,
    /// Key for the keyed hash of session tokens
    pub token_hmac_key: String,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub use_tls: bool,
    pub from_email: String,
    pub from_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Idle sleep between claim attempts, in seconds
    pub poll_interval_secs: u64,
    /// Lease duration for an in-flight job; expiry causes redelivery
    pub visibility_timeout_secs: i64,
    /// Default delivery attempts before a job is marked failed
    pub max_attempts: u32,
    /// First retry delay; doubles per attempt
    pub backoff_base_secs: i64,
    /// Upper bound on the retry delay
    pub backoff_cap_secs: i64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            http_host: env::var("HTTP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            http_port: env::var("HTTP_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("Invalid HTTP_PORT")?,
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").context("DATABASE_URL is required")?,
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
                min_connections: env::var("DATABASE_MIN_CONNECTIONS")
                    .unwrap_or_else(|_| "2".to_string())
                    .parse()
                    .unwrap_or(2),
            },
            auth: AuthConfig {
                max_failed_attempts: env::var("AUTH_MAX_FAILED_ATTEMPTS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .context("Invalid AUTH_MAX_FAILED_ATTEMPTS")?,
                session_ttl_secs: env::var("AUTH_SESSION_TTL_SECS")
                    .unwrap_or_else(|_| "86400".to_string())
                    .parse()
                    .context("Invalid AUTH_SESSION_TTL_SECS")?,
                token_hmac_key: env::var("AUTH_TOKEN_HMAC_KEY")
                    .context("AUTH_TOKEN_HMAC_KEY is required")?,
            },
            smtp: SmtpConfig {
                host: env::var("SMTP_HOST").unwrap_or_else(|_| "localhost".to_string()),
                port: env::var("SMTP_PORT")
                    .unwrap_or_else(|_| "587".to_string())
                    .parse()
                    .context("Invalid SMTP_PORT")?,
                username: env::var("SMTP_USERNAME").ok(),
                password: env::var("SMTP_PASSWORD").ok(),
                use_tls: env::var("SMTP_USE_TLS")
                    .map(|v| v == "true" || v == "1")
                    .unwrap_or(true),
                from_email: env::var("SMTP_FROM_EMAIL")
                    .unwrap_or_else(|_| "no-reply@assure.example".to_string()),
                from_name: env::var("SMTP_FROM_NAME").ok(),
            },
            worker: WorkerConfig {
                poll_interval_secs: env::var("WORKER_POLL_INTERVAL_SECS")
                    .unwrap_or_else(|_| "2".to_string())
                    .parse()
                    .unwrap_or(2),
                visibility_timeout_secs: env::var("WORKER_VISIBILITY_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse()
                    .unwrap_or(60),
                max_attempts: env::var("WORKER_MAX_ATTEMPTS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5),
                backoff_base_secs: env::var("WORKER_BACKOFF_BASE_SECS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5),
                backoff_cap_secs: env::var("WORKER_BACKOFF_CAP_SECS")
                    .unwrap_or_else(|_| "300".to_string())
                    .parse()
                    .unwrap_or(300),
            },
        })
    }

    /// HTTP listen address
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }
}
