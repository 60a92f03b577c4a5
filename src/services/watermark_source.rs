use reqwest::{Client, Url};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::services::compositor::WatermarkAsset;

/// Upper bound on a single watermark download.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Where a watermark image comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatermarkRef {
    Local(PathBuf),
    Remote(Url),
}

impl WatermarkRef {
    /// Validate a reference without downloading or decoding anything.
    ///
    /// URLs must point at a `.png` path. Local paths must end in `.png`
    /// and exist on disk.
    pub fn parse(reference: &str) -> Result<Self, WatermarkError> {
        if reference.starts_with("http://") || reference.starts_with("https://") {
            let url = Url::parse(reference).map_err(|e| WatermarkError::InvalidUrl {
                reference: reference.to_string(),
                reason: e.to_string(),
            })?;
            if !is_png(url.path()) {
                return Err(WatermarkError::NotPng(reference.to_string()));
            }
            return Ok(WatermarkRef::Remote(url));
        }

        if !is_png(reference) {
            return Err(WatermarkError::NotPng(reference.to_string()));
        }

        let path = PathBuf::from(reference);
        if !path.is_file() {
            return Err(WatermarkError::NotFound(path));
        }
        Ok(WatermarkRef::Local(path))
    }
}

impl std::fmt::Display for WatermarkRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WatermarkRef::Local(path) => write!(f, "{}", path.display()),
            WatermarkRef::Remote(url) => write!(f, "{url}"),
        }
    }
}

fn is_png(path: &str) -> bool {
    path.to_ascii_lowercase().ends_with(".png")
}

/// The two watermarks applied to every image, loaded once per run.
#[derive(Debug)]
pub struct WatermarkPair {
    pub left: WatermarkAsset,
    pub right: WatermarkAsset,
}

/// HTTP client used for remote watermark references.
pub fn http_client() -> Result<Client, WatermarkError> {
    Client::builder()
        .timeout(DOWNLOAD_TIMEOUT)
        .build()
        .map_err(WatermarkError::Client)
}

/// Load and decode both watermarks.
pub async fn load_pair(
    left: &WatermarkRef,
    right: &WatermarkRef,
    http: &Client,
) -> Result<Arc<WatermarkPair>, WatermarkError> {
    let left = resolve(left, http).await?;
    let right = resolve(right, http).await?;
    Ok(Arc::new(WatermarkPair { left, right }))
}

/// Decode a watermark from disk or download it over HTTP.
pub async fn resolve(reference: &WatermarkRef, http: &Client) -> Result<WatermarkAsset, WatermarkError> {
    let bytes = match reference {
        WatermarkRef::Local(path) => {
            tracing::info!(path = %path.display(), "Loading watermark from file");
            tokio::fs::read(path).await.map_err(|e| WatermarkError::Read {
                path: path.clone(),
                source: e,
            })?
        }
        WatermarkRef::Remote(url) => {
            tracing::info!(url = %url, "Downloading watermark");
            download(url, http).await?
        }
    };

    let label = reference.to_string();
    let asset = tokio::task::spawn_blocking(move || {
        image::load_from_memory(&bytes)
            .map(WatermarkAsset::new)
            .map_err(|e| WatermarkError::Decode {
                reference: label,
                source: e,
            })
    })
    .await
    .map_err(|e| WatermarkError::Task(e.to_string()))??;

    tracing::info!(
        reference = %reference,
        width = asset.width(),
        height = asset.height(),
        "Watermark loaded"
    );
    Ok(asset)
}

async fn download(url: &Url, http: &Client) -> Result<Vec<u8>, WatermarkError> {
    let response = http
        .get(url.clone())
        .send()
        .await
        .map_err(|e| WatermarkError::Http {
            reference: url.to_string(),
            source: e,
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(WatermarkError::Status {
            reference: url.to_string(),
            status: status.as_u16(),
        });
    }

    let body = response.bytes().await.map_err(|e| WatermarkError::Http {
        reference: url.to_string(),
        source: e,
    })?;
    Ok(body.to_vec())
}

#[derive(Debug, thiserror::Error)]
pub enum WatermarkError {
    #[error("watermark must be a PNG file: {0}")]
    NotPng(String),

    #[error("watermark file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("invalid watermark URL {reference}: {reason}")]
    InvalidUrl { reference: String, reason: String },

    #[error("failed to read watermark {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to download watermark from URL {reference}: {source}")]
    Http {
        reference: String,
        source: reqwest::Error,
    },

    #[error("failed to download watermark from URL {reference}: status code {status}")]
    Status { reference: String, status: u16 },

    #[error("failed to decode watermark {reference}: {source}")]
    Decode {
        reference: String,
        source: image::ImageError,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(reqwest::Error),

    #[error("watermark decode task failed: {0}")]
    Task(String),
}
