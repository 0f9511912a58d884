//! Main screenshot service orchestrating the cache pipeline
//!
//! Per request the service walks a fixed cascade:
//!
//! ```text
//! invalidate? ── no ──> transform cache ─hit─> relay
//!      │                     │ miss
//!      │                blob store ─hit─> serve jpeg
//!      │                     │ miss
//!     yes ─> delete blob ─> capture ─> upload ─> serve captured jpeg
//! ```
//!
//! Read-tier failures are logged and treated as misses. Capture and upload
//! failures end the request with an error response.

use crate::{
    BlobLookup, BlobStore, CacheError, CacheKey, CacheTier, CaptureClient, CaptureParameters,
    Config, ErrorSeverity, ImageResponse, Metrics, PageRequest, TransformClient, TransformLookup,
    TransformParameters,
};
use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

pub const CAPTURE_FAILURE_MESSAGE: &str = "Failed to generate screenshot";

/// Stateless request orchestrator over the three collaborators.
///
/// Cloning is cheap: configuration and metric handles are shared, and the
/// underlying `reqwest::Client` pools connections across clones.
///
/// # Examples
///
/// ```rust,no_run
/// use screenshot_cache::{Config, PageRequest, ScreenshotService};
/// use axum::http::HeaderMap;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config::from_env();
///     let service = ScreenshotService::new(config)?;
///
///     let request = PageRequest::parse("/pricing", Some("vw=1440"), service.config())?;
///     let response = service.handle(&request, &HeaderMap::new()).await;
///     println!("{} ({} bytes)", response.status, response.body.len());
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct ScreenshotService {
    config: Arc<Config>,
    transform: TransformClient,
    blobs: BlobStore,
    renderer: CaptureClient,
    metrics: Arc<Metrics>,
}

impl ScreenshotService {
    pub fn new(config: Config) -> Result<Self, CacheError> {
        Self::with_metrics(config, Arc::new(Metrics::noop()))
    }

    pub fn with_metrics(config: Config, metrics: Arc<Metrics>) -> Result<Self, CacheError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.http_timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;

        Ok(Self {
            transform: TransformClient::new(http.clone(), &config),
            blobs: BlobStore::new(http.clone(), &config),
            renderer: CaptureClient::new(http, &config),
            config: Arc::new(config),
            metrics,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the whole state machine for one routed request.
    pub async fn handle(&self, request: &PageRequest, headers: &HeaderMap) -> ImageResponse {
        if request.invalidate {
            self.invalidate(&request.key).await;
        } else if let Some(cached) = self.resolve(&request.key, headers, &request.transform).await {
            return cached;
        }

        self.regenerate(request).await
    }

    /// Try the transform cache, then the blob store. `None` means both missed.
    pub async fn resolve(
        &self,
        key: &CacheKey,
        headers: &HeaderMap,
        params: &TransformParameters,
    ) -> Option<ImageResponse> {
        match self.transform.lookup(key, headers, params).await {
            TransformLookup::Hit(response) => {
                debug!("Transform cache hit for {} ({})", key, response.status);
                self.metrics.record_hit(CacheTier::Transform);
                return Some(response);
            }
            TransformLookup::Miss => {}
            TransformLookup::Failed(_) => self.metrics.record_read_error(),
        }

        match self.blobs.fetch(key).await {
            BlobLookup::Hit(response) => {
                debug!("Blob store hit for {}", key);
                self.metrics.record_hit(CacheTier::Blob);
                return Some(response);
            }
            BlobLookup::Miss => {}
            BlobLookup::Failed(_) => self.metrics.record_read_error(),
        }

        self.metrics.record_miss();
        None
    }

    /// Delete the stored blob ahead of regeneration. Never fails.
    pub async fn invalidate(&self, key: &CacheKey) {
        info!("Invalidating {}", key);
        self.metrics.record_invalidation();
        self.blobs.delete(key).await;
    }

    pub async fn capture(&self, params: &CaptureParameters) -> Result<Bytes, CacheError> {
        let start = Instant::now();
        let result = self.renderer.capture(params).await;
        self.metrics.record_capture(start.elapsed(), result.is_ok());

        if let Ok(image) = &result {
            info!(
                "Captured {} ({} bytes in {:?})",
                params.source_url,
                image.len(),
                start.elapsed()
            );
        }

        result
    }

    /// Upload a fresh capture and serve it directly, without re-reading it.
    pub async fn persist(&self, key: &CacheKey, image: Bytes) -> Result<ImageResponse, CacheError> {
        self.blobs.upload(key, image.clone()).await?;
        Ok(ImageResponse::jpeg(image))
    }

    async fn regenerate(&self, request: &PageRequest) -> ImageResponse {
        let result = async {
            let image = self.capture(&request.capture).await?;
            self.persist(&request.key, image).await
        }
        .await;

        let err = match result {
            Ok(response) => return response,
            Err(err) => err,
        };

        if let CacheError::UploadFailed { status, .. } = &err {
            self.metrics.record_upload_failure();
            warn!("Upload of {} failed with {}: {}", request.key, status, err);
            return ImageResponse::text(*status, err.to_string());
        }

        match err.severity() {
            ErrorSeverity::High | ErrorSeverity::Critical => {
                error!("Screenshot error for {}: {}", request.path, err)
            }
            ErrorSeverity::Low | ErrorSeverity::Medium => {
                warn!("Screenshot error for {}: {}", request.path, err)
            }
        }
        ImageResponse::text(StatusCode::INTERNAL_SERVER_ERROR, CAPTURE_FAILURE_MESSAGE)
    }
}
