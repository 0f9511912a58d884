//! Client for the image transform service, the first read tier.

use crate::{is_miss_status, strip_hop_by_hop, CacheKey, Config, ImageResponse, TransformParameters};
use axum::http::{HeaderMap, StatusCode};
use tracing::{debug, error};

/// Outcome of one transform lookup.
#[derive(Debug)]
pub enum TransformLookup {
    /// `2xx` or `304`, to be relayed verbatim.
    Hit(ImageResponse),
    /// `404` or `204`.
    Miss,
    /// Any other status, or the call never completed.
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct TransformClient {
    http: reqwest::Client,
    base_url: String,
}

impl TransformClient {
    pub fn new(http: reqwest::Client, config: &Config) -> Self {
        Self {
            http,
            base_url: config.transform_url.trim_end_matches('/').to_string(),
        }
    }

    /// `{base}/{key}/{directives}`
    pub fn variant_url(&self, key: &CacheKey, params: &TransformParameters) -> String {
        format!("{}/{}/{}", self.base_url, key, params.to_path_segment())
    }

    /// Ask the transform service for a resized variant, forwarding the
    /// caller's headers so conditional requests (`If-None-Match`, ...) work.
    pub async fn lookup(
        &self,
        key: &CacheKey,
        inbound: &HeaderMap,
        params: &TransformParameters,
    ) -> TransformLookup {
        let url = self.variant_url(key, params);
        debug!("Transform lookup: {}", url);

        let response = match self.http.get(&url).headers(strip_hop_by_hop(inbound)).send().await {
            Ok(response) => response,
            Err(e) => {
                error!("Image resize error: {}", e);
                return TransformLookup::Failed(e.to_string());
            }
        };

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_MODIFIED {
            let headers = response.headers().clone();
            return match response.bytes().await {
                Ok(body) => TransformLookup::Hit(ImageResponse::passthrough(status, &headers, body)),
                Err(e) => {
                    error!("Image resize error: {}", e);
                    TransformLookup::Failed(e.to_string())
                }
            };
        }

        if is_miss_status(status) {
            return TransformLookup::Miss;
        }

        error!("Image resize error: {}", status);
        TransformLookup::Failed(format!("unexpected status {status}"))
    }
}
