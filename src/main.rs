//! PSA bridge stdio server - main entry point.
//!
//! Reads JSON-RPC requests from stdin, writes responses to stdout, logs to
//! stderr. Configuration comes from `PSA_*` environment variables, with a
//! few overrides on the command line.

use clap::Parser;
use std::sync::Arc;

use psa_bridge::api::RestClient;
use psa_bridge::mcp::StdioServer;
use psa_bridge::tools::ToolRouter;
use psa_bridge::Config;

#[derive(Debug, Parser)]
#[command(name = "psa-bridge", version, about = "Tool-calling bridge for PSA platforms")]
struct Args {
    /// Backing API base URL (overrides PSA_API_BASE_URL).
    #[arg(long, env = "PSA_API_BASE_URL")]
    base_url: Option<String>,

    /// Maximum tenant cache partitions (overrides PSA_CACHE_MAX_TENANTS).
    #[arg(long)]
    max_tenants: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration
    let mut config = Config::from_env()?;
    if let Some(base_url) = args.base_url {
        config.api.base_url = base_url;
    }
    if let Some(max_tenants) = args.max_tenants {
        config.cache.max_tenants = max_tenants;
    }
    config.validate()?;

    // Initialize observability
    psa_bridge::observability::init_tracing();

    let instance = uuid::Uuid::new_v4();
    tracing::info!(%instance, "psa-bridge starting");
    if !config.has_default_credentials() {
        tracing::warn!(
            "no default API credentials configured; tool calls must supply tenant credentials"
        );
    }

    let api = Arc::new(RestClient::new(config.api.clone())?);
    let router = Arc::new(ToolRouter::new(api, config.cache.clone())?);
    let server = Arc::new(StdioServer::new(router.clone()));

    // Ctrl-C requests graceful shutdown of the read loop.
    {
        let server = server.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                server.shutdown();
            }
        });
    }

    server.serve().await?;

    // Stop the resolver's background sweep before exiting.
    router.shutdown().await;
    tracing::info!(%instance, "psa-bridge stopped");

    Ok(())
}
