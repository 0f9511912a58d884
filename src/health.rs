use crate::Config;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthLevel {
    Ok,
    /// Running with a configuration that fails validation, e.g. a service
    /// built directly through the library API.
    Degraded,
}

/// Configured collaborator, reported without credentials.
#[derive(Debug, Clone, Serialize)]
pub struct CollaboratorInfo {
    pub name: &'static str,
    pub host: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue: Option<String>,
    pub version: &'static str,
    pub started_at: DateTime<Utc>,
    pub uptime_secs: u64,
    pub collaborators: Vec<CollaboratorInfo>,
}

pub struct HealthMonitor {
    started_at: DateTime<Utc>,
    started: Instant,
    issue: Option<String>,
    collaborators: Vec<CollaboratorInfo>,
}

impl HealthMonitor {
    pub fn new(config: &Config) -> Self {
        let collaborators = [
            ("site", &config.site_base_url),
            ("transform", &config.transform_url),
            ("blob_store", &config.blob_api_url),
            ("renderer", &config.render_api_url),
        ]
        .into_iter()
        .map(|(name, url)| CollaboratorInfo {
            name,
            host: url::Url::parse(url)
                .ok()
                .and_then(|u| u.host_str().map(|h| h.to_string())),
        })
        .collect();

        Self {
            started_at: Utc::now(),
            started: Instant::now(),
            issue: config.validate().err().map(|e| e.to_string()),
            collaborators,
        }
    }

    pub fn report(&self) -> HealthReport {
        HealthReport {
            status: match self.issue {
                Some(_) => HealthLevel::Degraded,
                None => HealthLevel::Ok,
            },
            issue: self.issue.clone(),
            version: env!("CARGO_PKG_VERSION"),
            started_at: self.started_at,
            uptime_secs: self.started.elapsed().as_secs(),
            collaborators: self.collaborators.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_hides_credentials() {
        let config = Config {
            site_base_url: "https://example.com".to_string(),
            blob_api_url: "https://api.blobs.test/v1/images".to_string(),
            blob_api_token: "secret-token".to_string(),
            ..Default::default()
        };

        let report = HealthMonitor::new(&config).report();
        assert_eq!(report.status, HealthLevel::Degraded);

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains(r#""status":"degraded""#));
        assert!(json.contains("IMAGE_URL is not set"));
        assert!(json.contains("api.blobs.test"));
        assert!(!json.contains("secret-token"));

        let transform = report
            .collaborators
            .iter()
            .find(|c| c.name == "transform")
            .unwrap();
        assert_eq!(transform.host, None);
    }

    #[test]
    fn test_valid_config_reports_ok() {
        let config = Config {
            site_base_url: "https://example.com".to_string(),
            transform_url: "https://images.example.com".to_string(),
            blob_api_url: "https://api.blobs.test/v1/images".to_string(),
            blob_api_token: "blob-token".to_string(),
            render_api_url: "https://render.example.com".to_string(),
            render_api_token: "render-token".to_string(),
            ..Default::default()
        };

        let report = HealthMonitor::new(&config).report();
        assert_eq!(report.status, HealthLevel::Ok);
        assert_eq!(report.issue, None);

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains(r#""status":"ok""#));
        assert!(!json.contains("issue"));
    }
}
