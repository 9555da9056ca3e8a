//! Server initialization and routing
//!
//! The pool, repositories, services, email transport and worker are all
//! constructed once here and passed down by handle; nothing is reached
//! through ambient global state.

use crate::api;
use crate::config::Config;
use crate::email::provider::EmailProvider;
use crate::email::SmtpEmailProvider;
use crate::migration;
use crate::repository::{
    credential::CredentialRepositoryImpl, job::JobRepositoryImpl, receipt::ReceiptRepositoryImpl,
};
use crate::service::{EmailDispatcher, JobWorker, LoginService};
use crate::telemetry;
use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use sqlx::{mysql::MySqlPoolOptions, MySqlPool};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db_pool: MySqlPool,
    pub login_service: Arc<LoginService<CredentialRepositoryImpl, JobRepositoryImpl>>,
}

/// Run the HTTP server and the job worker until shutdown.
pub async fn run(config: Config) -> Result<()> {
    let metrics_handle = telemetry::install_prometheus_recorder();
    telemetry::describe_metrics();

    migration::ensure_database_exists(&config).await?;
    migration::run_migrations(&config).await?;

    let db_pool = MySqlPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect(&config.database.url)
        .await?;

    let credential_repo = Arc::new(CredentialRepositoryImpl::new(db_pool.clone()));
    let job_repo = Arc::new(JobRepositoryImpl::new(db_pool.clone()));
    let receipt_repo = Arc::new(ReceiptRepositoryImpl::new(db_pool.clone()));

    let login_service = Arc::new(LoginService::new(
        credential_repo,
        job_repo.clone(),
        config.auth.clone(),
    ));

    let email_provider = Arc::new(
        SmtpEmailProvider::from_config(&config.smtp)
            .map_err(|e| anyhow::anyhow!("SMTP configuration: {}", e))?,
    );
    if let Err(e) = email_provider.test_connection().await {
        warn!("SMTP connection test failed: {}", e);
    }

    let dispatcher = EmailDispatcher::new(receipt_repo, email_provider);
    let worker = JobWorker::new(job_repo, dispatcher, config.worker.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker_handle = tokio::spawn(async move {
        worker.run(shutdown_rx).await;
    });

    let addr = config.http_addr();
    let state = AppState {
        config: Arc::new(config),
        db_pool,
        login_service,
    };

    let app = Router::new()
        .route("/login", post(api::auth::login))
        .route("/health", get(api::health::health))
        .route("/ready", get(api::health::ready))
        .route(
            "/metrics",
            get(move || {
                let handle = metrics_handle.clone();
                async move { handle.render() }
            }),
        )
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    let listener = TcpListener::bind(&addr).await?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop the worker after the HTTP server drained
    let _ = shutdown_tx.send(true);
    let _ = worker_handle.await;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
