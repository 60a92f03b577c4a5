use serde::Deserialize;
use std::path::PathBuf;

use crate::services::compositor::Placement;
use crate::services::storage::S3Settings;
use crate::services::watermark_source::{WatermarkError, WatermarkRef};

/// Variables that must be present and non-empty.
pub const REQUIRED_VARS: [&str; 5] = [
    "S3_BUCKET",
    "SOURCE_PREFIX",
    "TARGET_PREFIX",
    "LEFT_WATERMARK_PATH",
    "RIGHT_WATERMARK_PATH",
];

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Bucket holding both source and watermarked images
    #[serde(default)]
    pub s3_bucket: String,

    /// Listing root; also the part of each key replaced on upload
    #[serde(default)]
    pub source_prefix: String,

    /// Replacement for `source_prefix` in uploaded keys
    #[serde(default)]
    pub target_prefix: String,

    /// Local path or http(s) URL of the bottom-left watermark PNG
    #[serde(default)]
    pub left_watermark_path: String,

    /// Local path or http(s) URL of the bottom-right watermark PNG
    #[serde(default)]
    pub right_watermark_path: String,

    /// Watermarks taller than this many pixels are scaled down
    #[serde(default = "default_max_watermark_height")]
    pub max_watermark_height: u32,

    /// Distance in pixels between watermarks and the image edges
    #[serde(default = "default_watermark_padding")]
    pub watermark_padding: u32,

    /// Number of concurrent workers
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Quality used when writing JPEG output (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// S3 region name
    #[serde(default = "default_s3_region")]
    pub s3_region: String,

    /// Custom S3-compatible endpoint (MinIO, R2, ...)
    pub s3_endpoint: Option<String>,

    /// Explicit access key; falls back to the AWS credential chain
    pub s3_access_key: Option<String>,

    /// Secret paired with `s3_access_key`; both or neither
    pub s3_secret_key: Option<String>,

    /// Directory for per-image holding files
    pub temp_dir: Option<PathBuf>,
}

fn default_max_watermark_height() -> u32 {
    250
}

fn default_watermark_padding() -> u32 {
    20
}

fn default_max_workers() -> usize {
    5
}

fn default_jpeg_quality() -> u8 {
    95
}

fn default_s3_region() -> String {
    "us-east-1".to_string()
}

/// Parameters of a single watermarking run.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub source_prefix: String,
    pub target_prefix: String,
    pub placement: Placement,
    pub workers: usize,
    pub jpeg_quality: u8,
    pub temp_dir: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        envy::from_env().map_err(ConfigError::Parse)
    }

    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::from_iter(vars).map_err(ConfigError::Parse)
    }

    /// Names of every required variable that is unset or blank.
    pub fn missing_vars(&self) -> Vec<&'static str> {
        let values = [
            &self.s3_bucket,
            &self.source_prefix,
            &self.target_prefix,
            &self.left_watermark_path,
            &self.right_watermark_path,
        ];
        REQUIRED_VARS
            .into_iter()
            .zip(values)
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| name)
            .collect()
    }

    /// Check settings and validate both watermark references.
    pub fn validate(&self) -> Result<(WatermarkRef, WatermarkRef), ConfigError> {
        let missing = self.missing_vars();
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        if self.max_watermark_height == 0 {
            return Err(ConfigError::invalid("MAX_WATERMARK_HEIGHT", "must be greater than zero"));
        }
        if self.max_workers == 0 {
            return Err(ConfigError::invalid("MAX_WORKERS", "must be greater than zero"));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ConfigError::invalid("JPEG_QUALITY", "must be between 1 and 100"));
        }
        if self.s3_access_key.is_some() != self.s3_secret_key.is_some() {
            return Err(ConfigError::invalid(
                "S3_ACCESS_KEY",
                "S3_ACCESS_KEY and S3_SECRET_KEY must be set together",
            ));
        }

        let left = WatermarkRef::parse(self.left_watermark_path.trim())?;
        let right = WatermarkRef::parse(self.right_watermark_path.trim())?;
        Ok((left, right))
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            source_prefix: self.source_prefix.clone(),
            target_prefix: self.target_prefix.clone(),
            placement: Placement {
                max_height: self.max_watermark_height,
                padding: self.watermark_padding,
            },
            workers: self.max_workers,
            jpeg_quality: self.jpeg_quality,
            temp_dir: self.temp_dir.clone(),
        }
    }

    pub fn s3_settings(&self) -> S3Settings {
        S3Settings {
            bucket: self.s3_bucket.clone(),
            region: self.s3_region.clone(),
            endpoint: self.s3_endpoint.clone(),
            access_key: self.s3_access_key.clone(),
            secret_key: self.s3_secret_key.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("required environment variables are not set: {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    #[error("invalid configuration: {0}")]
    Parse(#[from] envy::Error),

    #[error("invalid value for {key}: {reason}")]
    InvalidSetting { key: &'static str, reason: String },

    #[error(transparent)]
    Watermark(#[from] WatermarkError),
}

impl ConfigError {
    fn invalid(key: &'static str, reason: &str) -> Self {
        ConfigError::InvalidSetting {
            key,
            reason: reason.to_string(),
        }
    }
}
