//! # Screenshot Cache
//!
//! An on-demand screenshot cache for a website. `GET /<path>` returns a JPEG
//! screenshot of `{SITE_BASE_URL}/<path>`, generated lazily on first request
//! and served from cache afterwards.
//!
//! ## Request flow
//!
//! | Step | Collaborator | On failure |
//! |------|--------------|------------|
//! | Resized variant lookup | transform service | logged, treated as miss |
//! | Raw image fetch | blob store | logged, treated as miss |
//! | Screenshot capture | rendering service | `500` |
//! | Upload | blob store | upstream status + message |
//!
//! `?invalidate=true` skips both lookups and deletes the stored image before
//! capturing a fresh one.
//!
//! ## Query parameters
//!
//! - `vw`, `vh`: capture viewport (default 1280x800)
//! - `quality`, `width`, `format`, `fit`, `height`, `gravity`: passed to the
//!   transform service
//! - `invalidate`: exactly `true` forces regeneration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use screenshot_cache::{router, AppState, Config, ScreenshotService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env();
//!     config.validate()?;
//!
//!     let service = ScreenshotService::new(config)?;
//!     let app = router(AppState::new(service, None));
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! screenshot-cache serve --port 8080 --metrics
//! screenshot-cache fetch blog/my-post --output post.jpeg --vw 1440
//! screenshot-cache key blog/my-post
//! ```

/// Configuration and settings for the screenshot cache
pub mod config;

/// Error types and error handling utilities
pub mod error;

/// Request routing, cache keys and capture/transform parameters
pub mod request;

/// Materialised HTTP replies shared by the server and the CLI
pub mod response;

/// Image transform service client
pub mod transform;

/// Blob store client
pub mod blob_store;

/// Headless rendering service client
pub mod capture;

/// Main service orchestrating the cache pipeline
pub mod screenshot_service;

/// HTTP server wiring
pub mod server;

/// Command-line interface implementation
pub mod cli;

/// Cache metrics collection
pub mod metrics;

/// Health reporting
pub mod health;


pub use blob_store::*;
pub use capture::*;
pub use cli::*;
pub use config::*;
pub use error::*;
pub use health::*;
pub use self::metrics::*;
pub use request::*;
pub use response::*;
pub use screenshot_service::*;
pub use server::*;
pub use transform::*;
