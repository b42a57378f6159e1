//! Prometheus metrics for the photo wall.
//!
//! Recording is a no-op until [`install_recorder`] has run, so library
//! users and tests pay nothing for it.

use anyhow::{Context, Result};
use metrics::{counter, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Installs the global Prometheus recorder.
///
/// # Errors
///
/// Returns an error if a global recorder is already installed.
pub fn install_recorder() -> Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")
}

/// Counts a submission by outcome (`accepted`, `busy`, `rejected`, ...).
pub fn record_submission(outcome: &'static str) {
    counter!("photowall_submissions_total", "outcome" => outcome).increment(1);
}

pub fn record_deletion() {
    counter!("photowall_deletions_total").increment(1);
}

pub fn record_evictions(count: usize) {
    if count > 0 {
        counter!("photowall_evictions_total").increment(count as u64);
    }
}

pub fn record_snapshot_write(ok: bool) {
    let result = if ok { "ok" } else { "error" };
    counter!("photowall_snapshot_writes_total", "result" => result).increment(1);
}

pub fn set_photo_count(count: usize) {
    gauge!("photowall_photos").set(count as f64);
}

pub fn set_subscriber_count(count: usize) {
    gauge!("photowall_subscribers").set(count as f64);
}
