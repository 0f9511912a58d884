use crate::{
    install_prometheus, serve, AppState, CacheKey, Config, Metrics, PageRequest, ScreenshotService,
};
use anyhow::{anyhow, Context};
use axum::http::HeaderMap;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "screenshot-cache")]
#[command(about = "On-demand page screenshot cache")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, help = "Configuration file path (JSON)")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Public base URL of the site to screenshot")]
    pub site_base_url: Option<String>,

    #[arg(long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server
    Serve {
        #[arg(short, long, env = "PORT", default_value = "8080", help = "Server port")]
        port: u16,

        #[arg(long, default_value = "0.0.0.0", help = "Bind address")]
        bind: String,

        #[arg(long, help = "Expose Prometheus metrics on /__metrics")]
        metrics: bool,
    },

    /// Resolve one page through the cache and write the image to disk
    Fetch {
        #[arg(help = "Page path, e.g. blog/my-post")]
        path: String,

        #[arg(short, long, help = "Output file path")]
        output: PathBuf,

        #[arg(long, help = "Delete the stored image and capture a fresh one")]
        invalidate: bool,

        #[arg(long, help = "Viewport width")]
        vw: Option<u32>,

        #[arg(long, help = "Viewport height")]
        vh: Option<u32>,
    },

    /// Print the cache key for a page path
    Key {
        #[arg(help = "Page path")]
        path: String,
    },

    /// Validate configuration
    Validate {
        #[arg(help = "Configuration file to validate")]
        file: PathBuf,
    },
}

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub path: String,
    pub output: PathBuf,
    pub invalidate: bool,
    pub vw: Option<u32>,
    pub vh: Option<u32>,
}

impl FetchOptions {
    /// Encode the options the same way an HTTP caller would.
    pub fn query(&self) -> String {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        if self.invalidate {
            query.append_pair("invalidate", "true");
        }
        if let Some(vw) = self.vw {
            query.append_pair("vw", &vw.to_string());
        }
        if let Some(vh) = self.vh {
            query.append_pair("vh", &vh.to_string());
        }
        query.finish()
    }
}

pub struct CliRunner {
    config_path: Option<PathBuf>,
    site_base_url: Option<String>,
}

impl CliRunner {
    pub fn new(args: &Cli) -> Self {
        Self {
            config_path: args.config.clone(),
            site_base_url: args.site_base_url.clone(),
        }
    }

    pub async fn run(
        &self,
        command: Commands,
        shutdown: broadcast::Receiver<()>,
    ) -> anyhow::Result<()> {
        match command {
            Commands::Serve { port, bind, metrics } => {
                self.run_server(port, &bind, metrics, shutdown_signal(shutdown))
                    .await
            }
            Commands::Fetch {
                path,
                output,
                invalidate,
                vw,
                vh,
            } => {
                self.run_fetch(FetchOptions {
                    path,
                    output,
                    invalidate,
                    vw,
                    vh,
                })
                .await
            }
            Commands::Key { path } => {
                println!("{}", CacheKey::from_path(path.trim_matches('/')));
                Ok(())
            }
            Commands::Validate { file } => self.validate_config(file).await,
        }
    }

    /// File, then environment, then CLI flags; validated before use.
    pub async fn load_config(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config_path {
            Some(path) => Config::from_file(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?,
            None => Config::default(),
        };

        config.apply_env();

        if let Some(site_base_url) = &self.site_base_url {
            config.site_base_url = site_base_url.clone();
        }

        config.validate()?;

        info!("Configuration loaded successfully");
        info!("Site: {}", config.site_base_url);
        info!(
            "Default viewport: {}x{}",
            config.default_viewport.width, config.default_viewport.height
        );

        Ok(config)
    }

    pub async fn run_server<F>(
        &self,
        port: u16,
        bind: &str,
        metrics: bool,
        shutdown: F,
    ) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let config = self.load_config().await?;

        // the recorder must exist before metric handles are registered
        let prometheus = if metrics {
            Some(install_prometheus()?)
        } else {
            None
        };

        let service = ScreenshotService::with_metrics(config, Arc::new(Metrics::new()))?;
        let addr: SocketAddr = format!("{bind}:{port}")
            .parse()
            .with_context(|| format!("Invalid bind address {bind}:{port}"))?;

        serve(addr, AppState::new(service, prometheus), shutdown).await?;
        Ok(())
    }

    pub async fn run_fetch(&self, options: FetchOptions) -> anyhow::Result<()> {
        let config = self.load_config().await?;
        let service = ScreenshotService::new(config)?;

        let query = options.query();
        let request = PageRequest::parse(&options.path, Some(&query), service.config())?;

        info!("Fetching {} (key {})", request.capture.source_url, request.key);
        let response = service.handle(&request, &HeaderMap::new()).await;

        if !response.status.is_success() {
            let body = String::from_utf8_lossy(&response.body);
            return Err(anyhow!("{}: {}", response.status, body));
        }

        if response.body.is_empty() {
            warn!("Empty response body for {}", request.key);
        }

        if let Some(parent) = options.output.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&options.output, &response.body).await?;

        println!("Screenshot saved:");
        println!("  Page: {}", request.capture.source_url);
        println!("  Key: {}", request.key);
        println!("  Output: {}", options.output.display());
        println!("  Content-Type: {}", response.content_type().unwrap_or("unknown"));
        println!("  Size: {} bytes", response.body.len());

        Ok(())
    }

    pub async fn validate_config(&self, config_path: PathBuf) -> anyhow::Result<()> {
        println!("Validating configuration: {}", config_path.display());

        let config = Config::from_file(&config_path).await?;
        config.validate()?;

        println!("Configuration is valid:");
        println!("  Site: {}", config.site_base_url);
        println!("  Transform service: {}", config.transform_url);
        println!("  Blob store: {}", config.blob_api_url);
        println!("  Renderer: {}", config.render_api_url);
        println!(
            "  Default viewport: {}x{}",
            config.default_viewport.width, config.default_viewport.height
        );
        match config.http_timeout() {
            Some(timeout) => println!("  HTTP timeout: {timeout:?}"),
            None => println!("  HTTP timeout: none"),
        }

        Ok(())
    }
}

/// Resolves once a shutdown message arrives. A closed channel never resolves,
/// so losing the signal handler cannot stop a running server.
pub async fn shutdown_signal(mut shutdown: broadcast::Receiver<()>) {
    if let Err(broadcast::error::RecvError::Closed) = shutdown.recv().await {
        warn!("Shutdown channel closed; running until the process is killed");
        std::future::pending::<()>().await;
    }
}

pub fn setup_logging(verbose: bool) -> anyhow::Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialise logging: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fetch_options() -> FetchOptions {
        FetchOptions {
            path: "blog/post".to_string(),
            output: PathBuf::from("out.jpeg"),
            invalidate: false,
            vw: None,
            vh: None,
        }
    }

    #[test]
    fn test_fetch_query_encoding() {
        assert_eq!(fetch_options().query(), "");

        let options = FetchOptions {
            invalidate: true,
            vw: Some(1440),
            vh: Some(900),
            ..fetch_options()
        };
        assert_eq!(options.query(), "invalidate=true&vw=1440&vh=900");
    }

    #[tokio::test]
    async fn test_shutdown_signal_ignores_dropped_sender() {
        let (tx, rx) = broadcast::channel::<()>(1);
        drop(tx);

        let waited =
            tokio::time::timeout(std::time::Duration::from_millis(50), shutdown_signal(rx)).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn test_shutdown_signal_resolves_on_message() {
        let (tx, rx) = broadcast::channel::<()>(1);
        tx.send(()).unwrap();

        let waited =
            tokio::time::timeout(std::time::Duration::from_millis(50), shutdown_signal(rx)).await;
        assert!(waited.is_ok());
    }

    #[test]
    fn test_cli_parses_serve() {
        let cli = Cli::try_parse_from(["screenshot-cache", "serve", "--port", "9000", "--metrics"])
            .unwrap();
        match cli.command {
            Commands::Serve { port, bind, metrics } => {
                assert_eq!(port, 9000);
                assert_eq!(bind, "0.0.0.0");
                assert!(metrics);
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn test_cli_parses_fetch_with_global_flags() {
        let cli = Cli::try_parse_from([
            "screenshot-cache",
            "fetch",
            "docs/intro",
            "-o",
            "intro.jpeg",
            "--vw",
            "1024",
            "--site-base-url",
            "https://example.com",
        ])
        .unwrap();

        assert_eq!(cli.site_base_url.as_deref(), Some("https://example.com"));
        match cli.command {
            Commands::Fetch { path, vw, vh, invalidate, .. } => {
                assert_eq!(path, "docs/intro");
                assert_eq!(vw, Some(1024));
                assert_eq!(vh, None);
                assert!(!invalidate);
            }
            _ => panic!("expected fetch"),
        }
    }
}
