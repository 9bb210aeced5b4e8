use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub const SIGNUPS_TOTAL: &str = "identity_signups_total";
pub const SIGNINS_TOTAL: &str = "identity_signins_total";
pub const SESSIONS_EXPIRED_TOTAL: &str = "identity_sessions_expired_total";

/// Install the process-wide Prometheus recorder. Call once from `main`.
pub fn install_recorder() -> Result<PrometheusHandle, anyhow::Error> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))
}

pub fn record_signup(outcome: &'static str) {
    metrics::counter!(SIGNUPS_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_signin(outcome: &'static str) {
    metrics::counter!(SIGNINS_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_session_expired() {
    metrics::counter!(SESSIONS_EXPIRED_TOTAL).increment(1);
}
