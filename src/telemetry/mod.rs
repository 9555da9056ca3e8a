//! Prometheus metrics setup and metric definitions

use metrics::describe_counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return a handle for rendering metrics.
pub fn install_prometheus_recorder() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// Register metric descriptions so Prometheus output carries HELP/TYPE
/// lines from startup.
pub fn describe_metrics() {
    // Login metrics
    describe_counter!(
        "assure_login_attempts_total",
        "Login attempts by outcome (success/wrong_password/unknown_user/locked/inactive)"
    );
    describe_counter!(
        "assure_account_lockouts_total",
        "Accounts locked after repeated failed logins"
    );

    // Job pipeline metrics
    describe_counter!(
        "assure_jobs_processed_total",
        "Job deliveries by result (completed/retried/failed)"
    );
    describe_counter!(
        "assure_jobs_released_total",
        "In-flight jobs returned to the queue after lease expiry"
    );
    describe_counter!("assure_emails_sent_total", "Emails sent by job type");
    describe_counter!(
        "assure_emails_suppressed_total",
        "Redeliveries suppressed by an existing sent receipt"
    );
}
