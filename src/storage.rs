use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::presigning::PresigningConfig;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Content types accepted for listing photos.
pub const ALLOWED_IMAGE_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/webp", "image/gif"];

/// Every listing image lives under this key prefix.
pub const IMAGE_KEY_PREFIX: &str = "listings/";

/// Presigned upload URLs expire after 10 minutes.
const UPLOAD_URL_TTL: Duration = Duration::from_secs(600);

/// Generic image-host failure. Provider details are kept for the logs only.
#[derive(Debug, Error)]
#[error("image host operation failed: {0}")]
pub struct StorageError(pub String);

/// ImageTransform
///
/// Optional resize parameters appended to a public image URL. Public listing
/// routes take them from the query string.
#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ImageTransform {
    /// Target width in pixels.
    pub width: Option<u32>,
    /// Target height in pixels.
    pub height: Option<u32>,
}

/// ImageStorage
///
/// Contract for the image host. The S3 client serves production and local MinIO;
/// the mock serves tests.
#[async_trait]
pub trait ImageStorage: Send + Sync {
    /// Creates the bucket if missing. Only used for local MinIO.
    async fn ensure_bucket_exists(&self);

    /// Signed URL the browser PUTs the image to directly.
    async fn presigned_upload_url(&self, key: &str, content_type: &str)
    -> Result<String, StorageError>;

    async fn delete_image(&self, key: &str) -> Result<(), StorageError>;

    /// Publicly readable URL of an object, optionally resized.
    fn public_url(&self, key: &str, transform: Option<&ImageTransform>) -> String;
}

/// sanitize_key
///
/// Removes empty, `.` and `..` segments so a caller-supplied key cannot walk out
/// of its prefix.
pub fn sanitize_key(key: &str) -> String {
    key.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// New object key for an uploaded image: `listings/<uuid>.<ext>`.
/// The extension is taken from the original filename and reduced to lowercase
/// alphanumerics.
pub fn new_image_key(filename: &str) -> String {
    let extension = std::path::Path::new(filename)
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .map(|ext| {
            ext.chars()
                .filter(char::is_ascii_alphanumeric)
                .collect::<String>()
                .to_ascii_lowercase()
        })
        .filter(|ext| !ext.is_empty())
        .unwrap_or_else(|| "bin".to_string());

    format!("{}{}.{}", IMAGE_KEY_PREFIX, Uuid::new_v4(), extension)
}

pub fn is_allowed_image_type(content_type: &str) -> bool {
    ALLOWED_IMAGE_TYPES.contains(&content_type)
}

fn build_public_url(base: &str, key: &str, transform: Option<&ImageTransform>) -> String {
    let mut url = format!("{}/{}", base.trim_end_matches('/'), sanitize_key(key));

    let params: Vec<String> = transform
        .map(|t| {
            [("width", t.width), ("height", t.height)]
                .into_iter()
                .filter_map(|(name, value)| value.map(|v| format!("{}={}", name, v)))
                .collect()
        })
        .unwrap_or_default();

    if !params.is_empty() {
        url.push('?');
        url.push_str(&params.join("&"));
    }
    url
}

/// S3ImageStorage
///
/// AWS SDK client pointed at any S3-compatible endpoint. Path-style addressing is
/// required by MinIO and most hosted gateways.
#[derive(Clone)]
pub struct S3ImageStorage {
    client: s3::Client,
    bucket_name: String,
    public_base_url: String,
}

impl S3ImageStorage {
    pub async fn new(
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        bucket: &str,
        public_base_url: &str,
    ) -> Self {
        let credentials =
            s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .region(s3::config::Region::new(region.to_string()))
            .behavior_version_latest()
            .force_path_style(true)
            .build();

        Self {
            client: s3::Client::from_conf(config),
            bucket_name: bucket.to_string(),
            public_base_url: public_base_url.to_string(),
        }
    }
}

#[async_trait]
impl ImageStorage for S3ImageStorage {
    async fn ensure_bucket_exists(&self) {
        // CreateBucket on an existing bucket just errors; nothing to do then.
        if let Err(e) = self
            .client
            .create_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await
        {
            tracing::debug!(error = %e, bucket = %self.bucket_name, "create_bucket skipped");
        }
    }

    async fn presigned_upload_url(
        &self,
        key: &str,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let presigning =
            PresigningConfig::expires_in(UPLOAD_URL_TTL).map_err(|e| StorageError(e.to_string()))?;

        let presigned_req = self
            .client
            .put_object()
            .bucket(&self.bucket_name)
            .key(key)
            // The upload must carry exactly this Content-Type.
            .content_type(content_type)
            .presigned(presigning)
            .await
            .map_err(|e| StorageError(e.to_string()))?;

        Ok(presigned_req.uri().to_string())
    }

    async fn delete_image(&self, key: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket_name)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError(e.to_string()))?;
        Ok(())
    }

    fn public_url(&self, key: &str, transform: Option<&ImageTransform>) -> String {
        build_public_url(&self.public_base_url, key, transform)
    }
}

/// MockImageStorage
///
/// In-memory stand-in used by the handler and router tests.
#[derive(Clone)]
pub struct MockImageStorage {
    /// When true, every remote operation fails.
    pub should_fail: bool,
}

impl MockImageStorage {
    pub const BASE_URL: &'static str = "http://localhost:9000/mock-bucket";

    pub fn new() -> Self {
        Self { should_fail: false }
    }

    pub fn new_failing() -> Self {
        Self { should_fail: true }
    }
}

impl Default for MockImageStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageStorage for MockImageStorage {
    async fn ensure_bucket_exists(&self) {}

    async fn presigned_upload_url(
        &self,
        key: &str,
        _content_type: &str,
    ) -> Result<String, StorageError> {
        if self.should_fail {
            return Err(StorageError("mock storage failure".to_string()));
        }
        Ok(format!(
            "{}/{}?signature=fake",
            Self::BASE_URL,
            sanitize_key(key)
        ))
    }

    async fn delete_image(&self, _key: &str) -> Result<(), StorageError> {
        if self.should_fail {
            return Err(StorageError("mock storage failure".to_string()));
        }
        Ok(())
    }

    fn public_url(&self, key: &str, transform: Option<&ImageTransform>) -> String {
        build_public_url(Self::BASE_URL, key, transform)
    }
}

/// The shared handle to the image host held in `AppState`.
pub type StorageState = Arc<dyn ImageStorage>;
