use clap::Parser;
use screenshot_cache::{setup_logging, Cli, CliRunner};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Cli::parse();

    setup_logging(args.verbose)?;

    info!("Starting screenshot-cache v{}", env!("CARGO_PKG_VERSION"));

    let runner = CliRunner::new(&args);

    // Setup graceful shutdown
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let _shutdown_handler = setup_shutdown_handler(shutdown_tx);

    if let Err(e) = runner.run(args.command, shutdown_rx).await {
        error!("Application error: {:#}", e);
        std::process::exit(1);
    }

    info!("screenshot-cache stopped");
    Ok(())
}

fn setup_shutdown_handler(shutdown_tx: broadcast::Sender<()>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => {
                        info!("Received SIGINT");
                    }
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM");
                    }
                }
            }
            Err(e) => {
                warn!("Failed to create SIGTERM handler, listening for SIGINT only: {}", e);
                if let Err(e) = signal::ctrl_c().await {
                    error!("Failed to listen for SIGINT: {}", e);
                    // keep the sender alive so the server is not stopped
                    std::future::pending::<()>().await;
                }
                info!("Received SIGINT");
            }
        }

        let _ = shutdown_tx.send(());
    })
}
