//! Metrics collection and Prometheus export.
//!
//! Installs the exporter and provides the counters recorded by the image handlers.

use metrics::counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

/// Global handle to the Prometheus recorder.
pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder.
///
/// Safe to call more than once; only the first call installs a recorder.
pub fn init_metrics() {
    if METRICS_HANDLE.get().is_some() {
        return;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            let _ = METRICS_HANDLE.set(handle);
        }
        Err(e) => {
            tracing::warn!(error = %e, "Prometheus recorder not installed");
        }
    }
}

/// Get the current metrics in Prometheus text format.
pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized".to_string())
}

pub fn record_images_uploaded(count: usize, bytes: usize) {
    counter!("images_uploaded_total").increment(count as u64);
    counter!("image_upload_bytes_total").increment(bytes as u64);
}

pub fn record_image_downloaded(bytes: usize) {
    counter!("image_downloads_total").increment(1);
    counter!("image_download_bytes_total").increment(bytes as u64);
}

pub fn record_image_updated() {
    counter!("images_updated_total").increment(1);
}

pub fn record_image_deleted() {
    counter!("images_deleted_total").increment(1);
}
