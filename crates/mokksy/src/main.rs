use anyhow::Context;
use clap::Parser;
use mokksy::config::Config;
use mokksy::server::{MetricsServer, MockServer};
use std::net::SocketAddr;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Standalone mock HTTP server driven by a YAML mapping file.
#[derive(Parser, Debug)]
#[command(name = "mokksy")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind (overrides the config file)
    #[arg(long, env = "MOKKSY_HOST")]
    host: Option<String>,

    /// Port to bind, 0 for ephemeral (overrides the config file)
    #[arg(short, long, env = "MOKKSY_PORT")]
    port: Option<u16>,

    /// YAML file with server settings and mappings
    #[arg(short, long, env = "MOKKSY_CONFIG")]
    config: Option<String>,

    /// Log every match and list mappings on misses
    #[arg(short, long)]
    verbose: bool,

    /// Serve Prometheus metrics on this port
    #[arg(long)]
    metrics_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "mokksy=debug"
    } else {
        "mokksy=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if args.verbose {
        config.server.verbose = true;
    }
    if let Some(port) = args.metrics_port {
        config.metrics.port = Some(port);
    }
    config.validate()?;

    let server = MockServer::start(config.server.clone()).await?;
    let handles = server
        .load(&config.mappings)
        .context("Failed to register mappings")?;
    info!("Registered {} mapping(s)", handles.len());

    if let Some(port) = config.metrics.port {
        let addr = SocketAddr::new(server.addr().ip(), port);
        tokio::spawn(async move {
            if let Err(e) = MetricsServer::new(addr).run().await {
                error!("Metrics server failed: {:#}", e);
            }
        });
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    if let Err(e) = server.verify_no_unmatched_requests() {
        warn!("{}", e);
    }
    server.shutdown().await?;
    Ok(())
}
