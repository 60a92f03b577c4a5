use serde::Serialize;
use strum::{Display, EnumString};

use crate::services::classifier;

/// Raster formats the pipeline accepts as input and writes back out.
#[derive(Debug, Clone, Copy, Serialize, EnumString, Display, PartialEq, Eq)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[strum(to_string = "jpeg", serialize = "jpg")]
    Jpeg,
    Png,
}

impl ImageFormat {
    /// Infer the format from the extension of an object key.
    pub fn from_key(key: &str) -> Option<Self> {
        let ext = classifier::extension(key)?;
        ext.parse().ok()
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
        }
    }

    pub fn file_suffix(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => ".jpg",
            ImageFormat::Png => ".png",
        }
    }
}

/// One unit of work: a candidate object key and the format inferred from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub key: String,
    pub format: ImageFormat,
}

impl ImageRef {
    /// Returns `None` when the key is not a supported input image.
    pub fn from_key(key: &str) -> Option<Self> {
        if !classifier::is_candidate(key) {
            return None;
        }
        ImageFormat::from_key(key).map(|format| Self {
            key: key.to_string(),
            format,
        })
    }
}
