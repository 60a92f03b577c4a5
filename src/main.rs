use bucket_watermark::{
    app_state::AppState,
    config::{AppConfig, ConfigError},
    services::{
        orchestrator::{Orchestrator, RunError},
        storage::S3Store,
        watermark_source,
    },
    telemetry,
};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::watch;

const USAGE: &str = "\
Required environment variables:
  S3_BUCKET: S3 bucket name
  SOURCE_PREFIX: Source directory prefix in S3
  TARGET_PREFIX: Target directory prefix in S3
  LEFT_WATERMARK_PATH: Path to left watermark PNG file or URL
  RIGHT_WATERMARK_PATH: Path to right watermark PNG file or URL";

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize structured logging
    telemetry::init_tracing();

    tracing::info!("Starting bucket watermark job");

    // Initialize Prometheus metrics recorder
    let metrics_handle = match telemetry::init_metrics() {
        Ok(handle) => handle,
        Err(e) => {
            tracing::error!(error = %e, "Failed to install metrics recorder");
            return ExitCode::FAILURE;
        }
    };

    // Load and validate configuration
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => return config_failure(e),
    };
    let (left_ref, right_ref) = match config.validate() {
        Ok(refs) => refs,
        Err(e) => return config_failure(e),
    };

    // Load both watermarks once; every worker shares them read-only
    let http = match watermark_source::http_client() {
        Ok(client) => client,
        Err(e) => return config_failure(e.into()),
    };
    let watermarks = match watermark_source::load_pair(&left_ref, &right_ref, &http).await {
        Ok(pair) => pair,
        Err(e) => return config_failure(e.into()),
    };

    tracing::info!(
        bucket = %config.s3_bucket,
        source_prefix = %config.source_prefix,
        target_prefix = %config.target_prefix,
        "Initializing S3 storage client"
    );
    let store = match S3Store::new(&config.s3_settings()) {
        Ok(store) => store,
        Err(e) => {
            tracing::error!(error = %e, "Failed to initialize S3 client");
            return ExitCode::FAILURE;
        }
    };

    let state = AppState::new(Arc::new(store), watermarks, config.pipeline_settings());
    let orchestrator = Orchestrator::new(state);

    // Stop handing out new images on Ctrl-C
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling remaining images");
            let _ = shutdown_tx.send(true);
        }
    });

    let result = orchestrator.run(shutdown_rx).await;
    tracing::info!(metrics = %metrics_handle.render(), "Run metrics");

    match result {
        Ok(summary) => {
            println!("{}", serde_json::to_string(&summary).unwrap_or_default());
            tracing::info!("Successfully completed all image processing");
            ExitCode::SUCCESS
        }
        Err(e) => {
            if let RunError::PartialFailure { summary, .. } = &e {
                println!("{}", serde_json::to_string(summary).unwrap_or_default());
            }
            tracing::error!(error = %e, "Failed to process images");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn config_failure(error: ConfigError) -> ExitCode {
    tracing::error!(error = %error, "Configuration validation failed");
    eprintln!("{error}\n{USAGE}");
    ExitCode::FAILURE
}
