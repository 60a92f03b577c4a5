use async_trait::async_trait;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::{Bucket, Region};
use std::path::Path;

/// Listing entry for one stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
}

/// Blob storage bound to a single bucket.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    fn bucket(&self) -> &str;

    /// Every object whose key starts with `prefix`, across all pages.
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>, StorageError>;

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Upload the contents of a local file under `key`.
    async fn put_file(&self, key: &str, path: &Path, content_type: &str) -> Result<(), StorageError>;
}

/// Connection settings for [`S3Store`].
#[derive(Debug, Clone, Default)]
pub struct S3Settings {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

/// S3 (or S3-compatible) object storage.
pub struct S3Store {
    bucket: Box<Bucket>,
}

impl S3Store {
    pub fn new(settings: &S3Settings) -> Result<Self, StorageError> {
        let region = match &settings.endpoint {
            Some(endpoint) => Region::Custom {
                region: settings.region.clone(),
                endpoint: endpoint.clone(),
            },
            None => settings
                .region
                .parse()
                .map_err(|e| StorageError::Config(format!("invalid region {}: {e}", settings.region)))?,
        };

        let credentials = match (&settings.access_key, &settings.secret_key) {
            (Some(access_key), Some(secret_key)) => {
                Credentials::new(Some(access_key), Some(secret_key), None, None, None)
            }
            _ => Credentials::default(),
        }
        .map_err(|e| StorageError::Config(e.to_string()))?;

        let mut bucket = Bucket::new(&settings.bucket, region, credentials)
            .map_err(|e| StorageError::Config(e.to_string()))?;
        if settings.endpoint.is_some() {
            bucket = bucket.with_path_style();
        }

        Ok(Self { bucket })
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    fn bucket(&self) -> &str {
        &self.bucket.name
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>, StorageError> {
        let pages = self.bucket.list(prefix.to_string(), None).await?;
        Ok(pages
            .into_iter()
            .flat_map(|page| page.contents)
            .map(|object| ObjectInfo {
                key: object.key,
                size: object.size,
            })
            .collect())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let response = self.bucket.get_object(key).await?;
        check_status(key, response.status_code())?;
        Ok(response.bytes().to_vec())
    }

    async fn put_file(&self, key: &str, path: &Path, content_type: &str) -> Result<(), StorageError> {
        let mut file = tokio::fs::File::open(path).await?;
        let response = match self
            .bucket
            .put_object_stream_with_content_type(&mut file, key, content_type)
            .await
        {
            Ok(response) => response,
            Err(S3Error::HttpFailWithBody(code, _)) => return check_status(key, code),
            Err(e) => return Err(e.into()),
        };
        tracing::debug!(key = %key, bytes = response.uploaded_bytes(), "Uploaded object");
        check_status(key, response.status_code())
    }
}

fn check_status(key: &str, code: u16) -> Result<(), StorageError> {
    if (200..300).contains(&code) {
        Ok(())
    } else if code == 404 {
        Err(StorageError::NotFound(key.to_string()))
    } else {
        Err(StorageError::Status {
            key: key.to_string(),
            code,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("S3 operation failed: {0}")]
    S3(#[from] S3Error),

    #[error("Storage configuration error: {0}")]
    Config(String),

    #[error("object {key} returned HTTP status {code}")]
    Status { key: String, code: u16 },

    #[error("object {0} not found")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
