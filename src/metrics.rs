use crate::CacheError;
use metrics::{register_counter, register_histogram, Counter, Histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Which read tier answered a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTier {
    Transform,
    Blob,
}

impl CacheTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheTier::Transform => "transform",
            CacheTier::Blob => "blob",
        }
    }
}

pub struct Metrics {
    pub transform_hits: Counter,
    pub blob_hits: Counter,
    pub misses: Counter,
    pub read_errors: Counter,
    pub invalidations: Counter,
    pub captures: Counter,
    pub capture_failures: Counter,
    pub upload_failures: Counter,
    pub capture_duration: Histogram,
}

impl Metrics {
    /// Register handles against the installed recorder.
    ///
    /// Call after [`install_prometheus`]; handles registered before a recorder
    /// exists stay no-ops forever.
    pub fn new() -> Self {
        Self {
            transform_hits: register_counter!(
                "screenshot_cache_hits_total",
                "tier" => CacheTier::Transform.as_str()
            ),
            blob_hits: register_counter!(
                "screenshot_cache_hits_total",
                "tier" => CacheTier::Blob.as_str()
            ),
            misses: register_counter!("screenshot_cache_misses_total"),
            read_errors: register_counter!("screenshot_cache_read_errors_total"),
            invalidations: register_counter!("screenshot_cache_invalidations_total"),
            captures: register_counter!("screenshot_cache_captures_total"),
            capture_failures: register_counter!("screenshot_cache_capture_failures_total"),
            upload_failures: register_counter!("screenshot_cache_upload_failures_total"),
            capture_duration: register_histogram!("screenshot_cache_capture_duration_seconds"),
        }
    }

    pub fn noop() -> Self {
        Self {
            transform_hits: Counter::noop(),
            blob_hits: Counter::noop(),
            misses: Counter::noop(),
            read_errors: Counter::noop(),
            invalidations: Counter::noop(),
            captures: Counter::noop(),
            capture_failures: Counter::noop(),
            upload_failures: Counter::noop(),
            capture_duration: Histogram::noop(),
        }
    }

    pub fn record_hit(&self, tier: CacheTier) {
        match tier {
            CacheTier::Transform => self.transform_hits.increment(1),
            CacheTier::Blob => self.blob_hits.increment(1),
        }
    }

    pub fn record_miss(&self) {
        self.misses.increment(1);
    }

    /// A read tier failed for a reason other than a plain miss.
    pub fn record_read_error(&self) {
        self.read_errors.increment(1);
    }

    pub fn record_invalidation(&self) {
        self.invalidations.increment(1);
    }

    pub fn record_capture(&self, duration: Duration, success: bool) {
        if success {
            self.captures.increment(1);
        } else {
            self.capture_failures.increment(1);
        }

        self.capture_duration.record(duration.as_secs_f64());
    }

    pub fn record_upload_failure(&self) {
        self.upload_failures.increment(1);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Install the global Prometheus recorder and return the handle used to
/// render the exposition text.
pub fn install_prometheus() -> Result<PrometheusHandle, CacheError> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| CacheError::Configuration(format!("Failed to install metrics recorder: {e}")))
}
