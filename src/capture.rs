//! Client for the headless rendering service.
//!
//! One attempt per call. A non-success reply becomes
//! [`CacheError::CaptureFailed`] carrying the service's response text.

use crate::{CacheError, CaptureParameters, Config};
use axum::body::Bytes;
use tracing::debug;

pub const HEADER_TOKEN: &str = "X-Prerender-Token";
pub const HEADER_VIEWPORT_WIDTH: &str = "prerender-viewport-width";
pub const HEADER_VIEWPORT_HEIGHT: &str = "prerender-viewport-height";
pub const HEADER_DEVICE_WIDTH: &str = "prerender-device-width";
pub const HEADER_DEVICE_HEIGHT: &str = "prerender-device-height";
pub const HEADER_SCREENSHOT_FORMAT: &str = "prerender-screenshot-format";
pub const HEADER_WAIT_EXTRA_LONG: &str = "prerender-wait-extra-long";

#[derive(Debug, Clone)]
pub struct CaptureClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl CaptureClient {
    pub fn new(http: reqwest::Client, config: &Config) -> Self {
        Self {
            http,
            base_url: config.render_api_url.trim_end_matches('/').to_string(),
            token: config.render_api_token.clone(),
        }
    }

    /// `{base}/screenshot/{source_url}`; the page URL is appended unencoded.
    pub fn screenshot_url(&self, source_url: &str) -> String {
        format!("{}/screenshot/{}", self.base_url, source_url)
    }

    pub async fn capture(&self, params: &CaptureParameters) -> Result<Bytes, CacheError> {
        let url = self.screenshot_url(&params.source_url);
        let width = params.viewport.width.to_string();
        let height = params.viewport.height.to_string();

        debug!(
            "Capturing {} at {}x{}",
            params.source_url, params.viewport.width, params.viewport.height
        );

        let response = self
            .http
            .get(&url)
            .header(HEADER_TOKEN, &self.token)
            .header(HEADER_VIEWPORT_WIDTH, &width)
            .header(HEADER_VIEWPORT_HEIGHT, &height)
            .header(HEADER_DEVICE_WIDTH, &width)
            .header(HEADER_DEVICE_HEIGHT, &height)
            .header(HEADER_SCREENSHOT_FORMAT, "jpeg")
            .header(HEADER_WAIT_EXTRA_LONG, "true")
            .send()
            .await
            .map_err(|e| CacheError::CaptureFailed(e.to_string()))?;

        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(CacheError::CaptureFailed(text));
        }

        response
            .bytes()
            .await
            .map_err(|e| CacheError::CaptureFailed(e.to_string()))
    }
}
