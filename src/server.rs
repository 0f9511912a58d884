//! HTTP surface: a catch-all page route plus two reserved operational routes.

use crate::{CacheError, HealthMonitor, HealthReport, ImageResponse, PageRequest, ScreenshotService};
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

pub const HEALTH_ROUTE: &str = "/__health";
pub const METRICS_ROUTE: &str = "/__metrics";

#[derive(Clone)]
pub struct AppState {
    pub service: ScreenshotService,
    pub health: Arc<HealthMonitor>,
    pub prometheus: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(service: ScreenshotService, prometheus: Option<PrometheusHandle>) -> Self {
        let health = Arc::new(HealthMonitor::new(service.config()));
        Self {
            service,
            health,
            prometheus,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let mut router = Router::new().route(HEALTH_ROUTE, get(health));

    if state.prometheus.is_some() {
        router = router.route(METRICS_ROUTE, get(metrics));
    }

    router
        .fallback(page)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn page(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> ImageResponse {
    match PageRequest::from_parts(&method, &uri, state.service.config()) {
        Ok(request) => state.service.handle(&request, &headers).await,
        Err(rejection) => rejection.into(),
    }
}

async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    Json(state.health.report())
}

async fn metrics(State(state): State<AppState>) -> Response {
    match &state.prometheus {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

pub async fn serve<F>(addr: SocketAddr, state: AppState, shutdown: F) -> Result<(), CacheError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Screenshot cache listening on {}", addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Server stopped");
    Ok(())
}
