use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::EnvFilter;

/// JSON logs on stderr, leaving stdout for the run summary.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();
}

/// Install the process-wide Prometheus recorder and register the job's metrics.
///
/// The returned handle renders the current values; the job logs a snapshot
/// when the run ends.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    metrics::describe_counter!(
        "watermark_objects_processed_total",
        "Images watermarked and uploaded"
    );
    metrics::describe_counter!(
        "watermark_objects_failed_total",
        "Images that could not be watermarked"
    );
    metrics::describe_counter!(
        "watermark_objects_skipped_total",
        "Listed objects that are not supported images"
    );
    metrics::describe_histogram!(
        "watermark_item_seconds",
        "Time to fetch, watermark and upload one image"
    );

    Ok(handle)
}
