//! Ad Marketplace — real-time partner ad selection and click/budget
//! accounting service.
//!
//! Entry point: loads configuration, wires the in-memory store into the
//! selection/delivery/accounting pipeline, and starts the HTTP server.

use std::sync::Arc;

use campaign_api::ApiServer;
use campaign_core::config::AppConfig;
use campaign_marketplace::InMemoryStore;
use clap::Parser;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "ad-marketplace")]
#[command(about = "Real-time partner ad selection and click/budget accounting service")]
#[command(version)]
struct Cli {
    /// Node identifier (overrides config)
    #[arg(long, env = "AD_MARKETPLACE__NODE_ID")]
    node_id: Option<String>,

    /// HTTP port (overrides config)
    #[arg(long, env = "AD_MARKETPLACE__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// Skip the Prometheus metrics exporter
    #[arg(long, default_value_t = false)]
    no_metrics: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ad_marketplace=info,tower_http=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("ad-marketplace starting up");

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "failed to load config, using defaults");
        AppConfig::default()
    });

    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }

    info!(
        node_id = %config.node_id,
        http_port = config.api.http_port,
        "configuration loaded"
    );

    let store = Arc::new(InMemoryStore::new());
    let api_server = ApiServer::new(config, store);

    if !cli.no_metrics {
        if let Err(e) = api_server.start_metrics().await {
            error!(error = %e, "failed to start metrics exporter");
        }
    }

    info!("ad-marketplace is ready to serve traffic");
    api_server.start_http().await?;

    info!("ad-marketplace shut down cleanly");
    Ok(())
}
