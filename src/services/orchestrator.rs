use futures::future::join_all;
use std::collections::VecDeque;
use std::io::{BufWriter, Write};
use std::sync::Arc;
use std::time::Instant;
use tempfile::NamedTempFile;
use tokio::sync::{mpsc, watch, Mutex};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::config::PipelineSettings;
use crate::models::image_ref::{ImageFormat, ImageRef};
use crate::models::outcome::{ItemFailure, ProcessOutcome, RunSummary};
use crate::services::compositor::{self, composite};
use crate::services::storage::StorageError;
use crate::services::watermark_source::WatermarkPair;

type WorkQueue = Arc<Mutex<VecDeque<ImageRef>>>;

/// Lists, watermarks and re-uploads every candidate image under the
/// configured source prefix.
pub struct Orchestrator {
    state: AppState,
}

impl Orchestrator {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Execute one complete run.
    ///
    /// Listing failures abort immediately. Per-image failures never do: they
    /// are collected and returned together as [`RunError::PartialFailure`]
    /// once every candidate has an outcome. Flipping `shutdown` to `true`
    /// stops new work; items that never ran are reported as cancelled.
    pub async fn run(&self, shutdown: watch::Receiver<bool>) -> Result<RunSummary, RunError> {
        let started = Instant::now();
        let mut summary = RunSummary::new(Uuid::new_v4());
        let settings = &self.state.settings;

        tracing::info!(
            run_id = %summary.run_id,
            bucket = %self.state.store.bucket(),
            source_prefix = %settings.source_prefix,
            target_prefix = %settings.target_prefix,
            workers = settings.workers,
            "Starting watermark run"
        );

        let objects = self
            .state
            .store
            .list(&settings.source_prefix)
            .await
            .map_err(|e| {
                tracing::error!(run_id = %summary.run_id, error = %e, "Failed to list objects");
                RunError::Listing(e)
            })?;

        summary.listed = objects.len();
        let candidates: VecDeque<ImageRef> = objects
            .iter()
            .filter_map(|object| ImageRef::from_key(&object.key))
            .collect();
        summary.candidates = candidates.len();
        summary.skipped = summary.listed - summary.candidates;
        metrics::counter!("watermark_objects_skipped_total").increment(summary.skipped as u64);

        let mut failures = Vec::new();
        if candidates.is_empty() {
            tracing::info!(
                run_id = %summary.run_id,
                listed = summary.listed,
                "No images found under source prefix"
            );
        } else {
            failures = self.dispatch(candidates, shutdown, &mut summary).await;
        }

        summary.finish(started.elapsed());
        tracing::info!(
            run_id = %summary.run_id,
            listed = summary.listed,
            processed = summary.processed,
            skipped = summary.skipped,
            failed = summary.failed,
            duration_ms = summary.duration_ms,
            "Watermark run complete"
        );

        if failures.is_empty() {
            Ok(summary)
        } else {
            Err(RunError::PartialFailure { summary, failures })
        }
    }

    /// Fan candidates out to the worker pool and tally every outcome.
    async fn dispatch(
        &self,
        candidates: VecDeque<ImageRef>,
        shutdown: watch::Receiver<bool>,
        summary: &mut RunSummary,
    ) -> Vec<ItemFailure> {
        let worker_count = self.state.settings.workers.clamp(1, candidates.len());
        let queue: WorkQueue = Arc::new(Mutex::new(candidates));
        let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel();

        let handles: Vec<_> = (1..=worker_count)
            .map(|id| {
                tokio::spawn(worker(
                    id,
                    self.state.clone(),
                    queue.clone(),
                    outcome_tx.clone(),
                    shutdown.clone(),
                ))
            })
            .collect();
        drop(outcome_tx);

        let mut failures = Vec::new();
        while let Some(outcome) = outcome_rx.recv().await {
            if let Some(failure) = summary.record(outcome) {
                failures.push(failure);
            }
        }

        for result in join_all(handles).await {
            if let Err(e) = result {
                tracing::error!(run_id = %summary.run_id, error = %e, "Worker task aborted");
            }
        }

        // Anything still queued was never picked up by a worker.
        let leftover: Vec<ImageRef> = queue.lock().await.drain(..).collect();
        for item in leftover {
            tracing::warn!(run_id = %summary.run_id, key = %item.key, "Image not processed");
            metrics::counter!("watermark_objects_failed_total").increment(1);
            if let Some(failure) = summary.record(ProcessOutcome::Failed {
                key: item.key,
                error: ProcessError::Cancelled.to_string(),
            }) {
                failures.push(failure);
            }
        }

        failures
    }
}

async fn worker(
    id: usize,
    state: AppState,
    queue: WorkQueue,
    outcomes: mpsc::UnboundedSender<ProcessOutcome>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let stop = *shutdown.borrow();
        if stop {
            tracing::debug!(worker = id, "Shutdown requested, worker stopping");
            break;
        }
        let Some(item) = queue.lock().await.pop_front() else {
            break;
        };

        tracing::info!(worker = id, key = %item.key, "Starting processing of image");
        let outcome = tokio::select! {
            outcome = process_item(&state, &item) => outcome,
            _ = cancelled(&mut shutdown) => ProcessOutcome::Failed {
                key: item.key.clone(),
                error: ProcessError::Cancelled.to_string(),
            },
        };

        match &outcome {
            ProcessOutcome::Processed {
                key,
                target_key,
                duration,
            } => {
                metrics::counter!("watermark_objects_processed_total").increment(1);
                metrics::histogram!("watermark_item_seconds").record(duration.as_secs_f64());
                tracing::info!(
                    worker = id,
                    key = %key,
                    target_key = %target_key,
                    duration_ms = duration.as_millis() as u64,
                    "Successfully processed image"
                );
            }
            ProcessOutcome::Failed { key, error } => {
                metrics::counter!("watermark_objects_failed_total").increment(1);
                tracing::error!(worker = id, key = %key, error = %error, "Failed to process image");
            }
        }

        if outcomes.send(outcome).is_err() {
            break;
        }
    }
}

/// Resolves once `shutdown` reads `true`; never resolves if the sender is gone.
async fn cancelled(shutdown: &mut watch::Receiver<bool>) {
    let closed = shutdown.wait_for(|stop| *stop).await.is_err();
    if closed {
        std::future::pending::<()>().await;
    }
}

async fn process_item(state: &AppState, item: &ImageRef) -> ProcessOutcome {
    let started = Instant::now();
    match watermark_object(state, item).await {
        Ok(target_key) => ProcessOutcome::Processed {
            key: item.key.clone(),
            target_key,
            duration: started.elapsed(),
        },
        Err(e) => ProcessOutcome::Failed {
            key: item.key.clone(),
            error: e.to_string(),
        },
    }
}

/// Fetch, watermark and upload one object, returning the key written.
async fn watermark_object(state: &AppState, item: &ImageRef) -> Result<String, ProcessError> {
    let bytes = state.store.get(&item.key).await.map_err(ProcessError::Fetch)?;
    tracing::debug!(key = %item.key, bytes = bytes.len(), "Downloaded image");

    let watermarks = state.watermarks.clone();
    let settings = state.settings.clone();
    let format = item.format;
    let holding = tokio::task::spawn_blocking(move || render(&bytes, &watermarks, &settings, format))
        .await
        .map_err(|e| ProcessError::Task(e.to_string()))??;

    let settings = &state.settings;
    let target = target_key(&item.key, &settings.source_prefix, &settings.target_prefix);
    tracing::debug!(key = %item.key, target_key = %target, "Uploading watermarked image");
    state
        .store
        .put_file(&target, holding.path(), format.content_type())
        .await
        .map_err(ProcessError::Upload)?;

    if let Err(e) = holding.close() {
        tracing::warn!(key = %item.key, error = %e, "Failed to remove holding file");
    }
    Ok(target)
}

/// Decode, composite and encode into a holding file that is deleted on drop.
fn render(
    bytes: &[u8],
    watermarks: &WatermarkPair,
    settings: &PipelineSettings,
    format: ImageFormat,
) -> Result<NamedTempFile, ProcessError> {
    let base = image::load_from_memory(bytes).map_err(ProcessError::Decode)?;
    tracing::debug!(width = base.width(), height = base.height(), "Decoded image");

    let output = composite(&base, &watermarks.left, &watermarks.right, settings.placement);

    let mut builder = tempfile::Builder::new();
    builder.prefix("watermarked-").suffix(format.file_suffix());
    let mut holding = match &settings.temp_dir {
        Some(dir) => builder.tempfile_in(dir),
        None => builder.tempfile(),
    }
    .map_err(ProcessError::HoldingFile)?;

    let mut writer = BufWriter::new(holding.as_file_mut());
    compositor::encode(&output, format, settings.jpeg_quality, &mut writer)
        .map_err(ProcessError::Encode)?;
    writer.flush().map_err(ProcessError::HoldingFile)?;
    drop(writer);

    Ok(holding)
}

/// Destination key: the source prefix swapped for the target prefix, with
/// the rest of the path kept intact.
pub fn target_key(key: &str, source_prefix: &str, target_prefix: &str) -> String {
    match key.strip_prefix(source_prefix) {
        Some(rest) => format!("{target_prefix}{rest}"),
        None => key.replacen(source_prefix, target_prefix, 1),
    }
}

/// Failure of a single image; recorded, never fatal to the run.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("failed to get object: {0}")]
    Fetch(StorageError),

    #[error("failed to decode image: {0}")]
    Decode(image::ImageError),

    #[error("failed to encode image: {0}")]
    Encode(image::ImageError),

    #[error("holding file error: {0}")]
    HoldingFile(std::io::Error),

    #[error("failed to upload processed image: {0}")]
    Upload(StorageError),

    #[error("image task failed: {0}")]
    Task(String),

    #[error("cancelled before completion")]
    Cancelled,
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("failed to list objects: {0}")]
    Listing(StorageError),

    #[error(
        "encountered {} errors during processing: {}",
        .failures.len(),
        format_failures(.failures)
    )]
    PartialFailure {
        summary: RunSummary,
        failures: Vec<ItemFailure>,
    },
}

fn format_failures(failures: &[ItemFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {}", f.key, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_key_keeps_nested_path() {
        assert_eq!(
            target_key("raw/2024/06/cat.jpg", "raw/", "marked/"),
            "marked/2024/06/cat.jpg"
        );
        assert_eq!(target_key("raw/cat.png", "raw", "out"), "out/cat.png");
    }

    #[test]
    fn test_target_key_without_leading_prefix() {
        assert_eq!(target_key("x/raw/cat.png", "raw/", "marked/"), "x/marked/cat.png");
        assert_eq!(target_key("cat.png", "raw/", "marked/"), "cat.png");
    }

    #[test]
    fn test_partial_failure_lists_keys() {
        let err = RunError::PartialFailure {
            summary: RunSummary::new(Uuid::new_v4()),
            failures: vec![
                ItemFailure {
                    key: "raw/a.jpg".to_string(),
                    error: "failed to get object: boom".to_string(),
                },
                ItemFailure {
                    key: "raw/b.png".to_string(),
                    error: "failed to decode image: bad".to_string(),
                },
            ],
        };
        let message = err.to_string();
        assert!(message.starts_with("encountered 2 errors"));
        assert!(message.contains("raw/a.jpg: failed to get object: boom"));
        assert!(message.contains("raw/b.png"));
    }
}
