use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crpt_gateway::config::GatewayConfig;
use crpt_gateway::{Document, HttpTransport, PermitPool, SubmissionGateway};

/// Submit a document to the CRPT registration API.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to a YAML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to the JSON document to submit
    #[arg(long)]
    document: PathBuf,

    /// Signature token sent with the request
    #[arg(long, env = "GATEWAY_SIGNATURE", hide_env_values = true)]
    signature: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    info!("Starting Crpt Gateway");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = GatewayConfig::load(args.config.as_deref())?;
    info!(
        time_unit = ?config.limiter.time_unit,
        requests_per_unit = config.limiter.requests_per_unit,
        "Configuration loaded"
    );

    let document = Document::from_file(&args.document)?;

    let pool = Arc::new(PermitPool::from_config(&config.limiter)?);
    let transport = HttpTransport::from_config(&config.transport)?;
    let gateway = SubmissionGateway::new(pool.clone(), transport);

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            cancel.cancel();
        }
    });

    let result = gateway
        .submit_cancellable(&document, &args.signature, &cancel)
        .await;

    pool.shutdown();

    let response = result?;
    println!("Response: {}", response);
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, cancelling submission");
        }
        _ = terminate => {
            info!("Received SIGTERM, cancelling submission");
        }
    }
}
