//! Client for the blob store: durable raw bytes addressed by [`CacheKey`].
//!
//! Reads and deletes never fail the request; uploads do.

use crate::{is_miss_status, CacheError, CacheKey, Config, ImageResponse, JPEG_CONTENT_TYPE};
use axum::body::Bytes;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

#[derive(Debug)]
pub enum BlobLookup {
    Hit(ImageResponse),
    Miss,
    Failed(String),
}

#[derive(Debug, Serialize)]
struct UploadMetadata<'a> {
    id: String,
    key: &'a str,
}

#[derive(Debug, Deserialize)]
struct UploadErrorBody {
    errors: Vec<UploadErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct UploadErrorEntry {
    message: String,
}

#[derive(Debug, Clone)]
pub struct BlobStore {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl BlobStore {
    pub fn new(http: reqwest::Client, config: &Config) -> Self {
        Self {
            http,
            base_url: config.blob_api_url.trim_end_matches('/').to_string(),
            token: config.blob_api_token.clone(),
        }
    }

    /// `GET {base}/{key}/blob`. A `2xx` with an empty body counts as a miss.
    pub async fn fetch(&self, key: &CacheKey) -> BlobLookup {
        let url = format!("{}/{}/blob", self.base_url, key);
        debug!("Blob fetch: {}", url);

        let response = match self.http.get(&url).bearer_auth(&self.token).send().await {
            Ok(response) => response,
            Err(e) => {
                error!("Image fetch error: {}", e);
                return BlobLookup::Failed(e.to_string());
            }
        };

        let status = response.status();
        if status.is_success() {
            return match response.bytes().await {
                Ok(body) if !body.is_empty() => BlobLookup::Hit(ImageResponse::jpeg(body)),
                Ok(_) => BlobLookup::Miss,
                Err(e) => {
                    error!("Image fetch error: {}", e);
                    BlobLookup::Failed(e.to_string())
                }
            };
        }

        if is_miss_status(status) {
            return BlobLookup::Miss;
        }

        error!("Image fetch error: {}", status);
        BlobLookup::Failed(format!("unexpected status {status}"))
    }

    /// `DELETE {base}/{key}`, best effort.
    pub async fn delete(&self, key: &CacheKey) {
        let url = format!("{}/{}", self.base_url, key);

        match self.http.delete(&url).bearer_auth(&self.token).send().await {
            Ok(response) if response.status().is_success() || is_miss_status(response.status()) => {
                debug!("Deleted blob {}", key);
            }
            Ok(response) => warn!("Image delete error: {} for {}", response.status(), key),
            Err(e) => error!("Image delete error: {}", e),
        }
    }

    /// Multipart `POST {base}` storing `image` under `key`.
    pub async fn upload(&self, key: &CacheKey, image: Bytes) -> Result<(), CacheError> {
        let metadata = serde_json::to_string(&UploadMetadata {
            id: uuid::Uuid::new_v4().to_string(),
            key: key.as_str(),
        })?;

        let file = Part::bytes(image.to_vec())
            .file_name(key.to_string())
            .mime_str(JPEG_CONTENT_TYPE)?;

        let form = Form::new()
            .part("file", file)
            .text("id", key.to_string())
            .text("metadata", metadata)
            .text("requireSignedURLs", "false");

        let response = self
            .http
            .post(&self.base_url)
            .bearer_auth(&self.token)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            debug!("Uploaded {} ({} bytes)", key, image.len());
            return Ok(());
        }

        let body = response.bytes().await.unwrap_or_default();
        Err(CacheError::UploadFailed {
            status,
            detail: parse_upload_errors(&body),
        })
    }
}

/// Join the messages of a `{"errors": [{"message": ..}]}` body.
///
/// Returns `None` when the body has another shape or lists no errors, so an
/// empty `errors` array reads as a bare `Upload failed` rather than
/// `Upload failed: ` with nothing after the colon.
pub fn parse_upload_errors(body: &[u8]) -> Option<String> {
    let parsed: UploadErrorBody = serde_json::from_slice(body).ok()?;
    if parsed.errors.is_empty() {
        return None;
    }

    Some(
        parsed
            .errors
            .into_iter()
            .map(|e| e.message)
            .collect::<Vec<_>>()
            .join(", "),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_upload_errors() {
        let body = br#"{"success":false,"errors":[{"code":5400,"message":"x"},{"message":"y"}]}"#;
        assert_eq!(parse_upload_errors(body), Some("x, y".to_string()));
    }

    #[test]
    fn test_parse_upload_errors_tolerates_other_shapes() {
        assert_eq!(parse_upload_errors(b"<html>Bad Gateway</html>"), None);
        assert_eq!(parse_upload_errors(br#"{"errors":[]}"#), None);
        assert_eq!(parse_upload_errors(br#"{"errors":[{"code":1}]}"#), None);
        assert_eq!(parse_upload_errors(b""), None);
    }

    #[test]
    fn test_metadata_shape() {
        let metadata = UploadMetadata {
            id: "0000".to_string(),
            key: "about.jpeg",
        };
        assert_eq!(
            serde_json::to_string(&metadata).unwrap(),
            r#"{"id":"0000","key":"about.jpeg"}"#
        );
    }
}
