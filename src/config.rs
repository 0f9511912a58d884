//! Configuration management with serde serialization/deserialization
//!
//! All collaborator endpoints and credentials are fixed at process start and
//! passed into the service as one immutable [`Config`] value. Values come from
//! an optional JSON file, then environment variables, then CLI flags.

use crate::CacheError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

pub const ENV_SITE_BASE_URL: &str = "SITE_BASE_URL";
pub const ENV_TRANSFORM_URL: &str = "IMAGE_URL";
pub const ENV_BLOB_API_URL: &str = "BLOB_API_URL";
pub const ENV_BLOB_API_TOKEN: &str = "BLOB_API_TOKEN";
pub const ENV_RENDER_API_URL: &str = "HEADLESS_API_URL";
pub const ENV_RENDER_API_TOKEN: &str = "HEADLESS_API_TOKEN";
pub const ENV_HTTP_TIMEOUT_SECS: &str = "HTTP_TIMEOUT_SECS";

/// Main configuration structure for the screenshot cache
///
/// # Examples
///
/// ```rust
/// use screenshot_cache::Config;
///
/// let config = Config {
///     site_base_url: "https://example.com".to_string(),
///     ..Default::default()
/// };
/// assert_eq!(config.default_viewport.width, 1280);
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Public base URL of the site being screenshotted.
    ///
    /// The request path is appended to this to build the page URL handed to
    /// the rendering service.
    pub site_base_url: String,

    /// Base URL of the image transform service.
    pub transform_url: String,

    /// Base URL of the blob store API (fetch, upload and delete).
    pub blob_api_url: String,

    /// Bearer token for the blob store API.
    pub blob_api_token: String,

    /// Base URL of the headless rendering service.
    pub render_api_url: String,

    /// Token sent to the rendering service in `X-Prerender-Token`.
    pub render_api_token: String,

    /// Viewport used when `vw`/`vh` are absent or unusable (default: 1280x800)
    pub default_viewport: ViewportDefaults,

    /// Transform directives used when the request does not supply them
    pub transform_defaults: TransformDefaults,

    /// Per-call timeout for collaborator requests (default: none)
    ///
    /// Without it, calls run until the platform or the peer gives up.
    pub http_timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            site_base_url: String::new(),
            transform_url: String::new(),
            blob_api_url: String::new(),
            blob_api_token: String::new(),
            render_api_url: String::new(),
            render_api_token: String::new(),
            default_viewport: ViewportDefaults::default(),
            transform_defaults: TransformDefaults::default(),
            http_timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct ViewportDefaults {
    pub width: u32,
    pub height: u32,
}

impl Default for ViewportDefaults {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 800,
        }
    }
}

/// Fallback values for the transform directives that are always sent.
///
/// `height` and `gravity` have no default: they are only sent when the
/// request carries them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TransformDefaults {
    pub quality: String,
    pub width: String,
    pub format: String,
    pub fit: String,
}

impl Default for TransformDefaults {
    fn default() -> Self {
        Self {
            quality: "80".to_string(),
            width: "500".to_string(),
            format: "auto".to_string(),
            fit: "cover".to_string(),
        }
    }
}

impl Config {
    /// Build a configuration purely from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Overlay any set environment variables onto this configuration.
    pub fn apply_env(&mut self) {
        self.apply_vars(|name| std::env::var(name).ok());
    }

    fn apply_vars<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let fields: [(&str, &mut String); 6] = [
            (ENV_SITE_BASE_URL, &mut self.site_base_url),
            (ENV_TRANSFORM_URL, &mut self.transform_url),
            (ENV_BLOB_API_URL, &mut self.blob_api_url),
            (ENV_BLOB_API_TOKEN, &mut self.blob_api_token),
            (ENV_RENDER_API_URL, &mut self.render_api_url),
            (ENV_RENDER_API_TOKEN, &mut self.render_api_token),
        ];

        for (name, field) in fields {
            if let Some(value) = lookup(name).filter(|v| !v.is_empty()) {
                *field = value;
            }
        }

        if let Some(value) = lookup(ENV_HTTP_TIMEOUT_SECS).filter(|v| !v.is_empty()) {
            match value.parse::<u64>() {
                Ok(secs) => self.http_timeout_secs = Some(secs),
                Err(e) => warn!("Ignoring {}={:?}: {}", ENV_HTTP_TIMEOUT_SECS, value, e),
            }
        }
    }

    pub async fn from_file(path: &std::path::Path) -> Result<Self, CacheError> {
        let content = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn http_timeout(&self) -> Option<Duration> {
        self.http_timeout_secs.map(Duration::from_secs)
    }

    /// Site base URL with trailing separators removed.
    pub fn site_base(&self) -> &str {
        self.site_base_url.trim_end_matches('/')
    }

    pub fn validate(&self) -> Result<(), CacheError> {
        let urls = [
            (ENV_SITE_BASE_URL, &self.site_base_url),
            (ENV_TRANSFORM_URL, &self.transform_url),
            (ENV_BLOB_API_URL, &self.blob_api_url),
            (ENV_RENDER_API_URL, &self.render_api_url),
        ];

        for (name, value) in urls {
            if value.is_empty() {
                return Err(CacheError::Configuration(format!("{name} is not set")));
            }
            let parsed = url::Url::parse(value)
                .map_err(|e| CacheError::Configuration(format!("{name} is not a valid URL: {e}")))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(CacheError::Configuration(format!(
                    "{name} must use http or https, got {}",
                    parsed.scheme()
                )));
            }
        }

        if self.blob_api_token.is_empty() {
            return Err(CacheError::Configuration(format!(
                "{ENV_BLOB_API_TOKEN} is not set"
            )));
        }

        if self.render_api_token.is_empty() {
            return Err(CacheError::Configuration(format!(
                "{ENV_RENDER_API_TOKEN} is not set"
            )));
        }

        if self.default_viewport.width == 0 || self.default_viewport.height == 0 {
            return Err(CacheError::Configuration(
                "Viewport dimensions must be greater than 0".to_string(),
            ));
        }

        if self.http_timeout_secs == Some(0) {
            return Err(CacheError::Configuration(
                "HTTP timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn valid_config() -> Config {
        Config {
            site_base_url: "https://example.com/".to_string(),
            transform_url: "https://images.example.com".to_string(),
            blob_api_url: "https://blobs.example.com/v1".to_string(),
            blob_api_token: "blob-token".to_string(),
            render_api_url: "https://render.example.com".to_string(),
            render_api_token: "render-token".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.default_viewport, ViewportDefaults { width: 1280, height: 800 });
        assert_eq!(config.transform_defaults.quality, "80");
        assert_eq!(config.transform_defaults.width, "500");
        assert_eq!(config.transform_defaults.format, "auto");
        assert_eq!(config.transform_defaults.fit, "cover");
        assert!(config.http_timeout().is_none());
    }

    #[test]
    fn test_validate_accepts_complete_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_values() {
        let mut config = valid_config();
        config.blob_api_token.clear();
        assert!(matches!(config.validate(), Err(CacheError::Configuration(_))));

        let mut config = valid_config();
        config.render_api_url = "ftp://render.example.com".to_string();
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.site_base_url = "not a url".to_string();
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.default_viewport.width = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_site_base_trims_trailing_slashes() {
        let mut config = valid_config();
        config.site_base_url = "https://example.com///".to_string();
        assert_eq!(config.site_base(), "https://example.com");
    }

    #[test]
    fn test_env_overlay() {
        let vars: HashMap<&str, &str> = [
            (ENV_SITE_BASE_URL, "https://site.test"),
            (ENV_BLOB_API_TOKEN, "from-env"),
            (ENV_RENDER_API_TOKEN, ""),
            (ENV_HTTP_TIMEOUT_SECS, "15"),
        ]
        .into_iter()
        .collect();

        let mut config = valid_config();
        config.apply_vars(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.site_base_url, "https://site.test");
        assert_eq!(config.blob_api_token, "from-env");
        // empty values do not clobber what is already set
        assert_eq!(config.render_api_token, "render-token");
        assert_eq!(config.http_timeout(), Some(Duration::from_secs(15)));
    }

    #[test]
    fn test_env_timeout_ignores_non_numeric() {
        let mut config = valid_config();
        config.http_timeout_secs = Some(30);

        config.apply_vars(|name| (name == ENV_HTTP_TIMEOUT_SECS).then(|| "30s".to_string()));
        assert_eq!(config.http_timeout(), Some(Duration::from_secs(30)));

        config.apply_vars(|name| (name == ENV_HTTP_TIMEOUT_SECS).then(|| String::new()));
        assert_eq!(config.http_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"site_base_url": "https://example.com"}"#).unwrap();
        assert_eq!(config.site_base_url, "https://example.com");
        assert_eq!(config.default_viewport.height, 800);
        assert_eq!(config.transform_defaults.fit, "cover");
    }

    fn scratch_file(contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("screenshot-cache-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[tokio::test]
    async fn test_from_file_round_trip() {
        let path = scratch_file(&serde_json::to_string(&valid_config()).unwrap());

        let config = tokio_test::assert_ok!(Config::from_file(&path).await);
        tokio_test::assert_ok!(config.validate());
        assert_eq!(config.render_api_token, "render-token");

        std::fs::remove_file(path).unwrap();
    }

    #[tokio::test]
    async fn test_from_file_errors() {
        let missing = std::env::temp_dir().join("screenshot-cache-does-not-exist.json");
        let err = tokio_test::assert_err!(Config::from_file(&missing).await);
        assert!(matches!(err, CacheError::Io(_)));

        let path = scratch_file("{ not json");
        let err = tokio_test::assert_err!(Config::from_file(&path).await);
        assert!(matches!(err, CacheError::Serialization(_)));

        std::fs::remove_file(path).unwrap();
    }
}
