use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hostwatch::api;
use hostwatch::cli;
use hostwatch::node::Node;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse args and env vars
    let args = cli::Cli::parse();
    let settings = args.into_settings()?;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "hostwatch=debug,tower_http=debug".into());
    if settings.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let socket_address = settings.api_address();
    info!(
        "Starting Hostwatch node {} as {} ({} peers)",
        settings.node_name,
        settings.role,
        settings.peers.len()
    );
    let node = Node::start(settings).await?;

    // Build Axum Router
    let api = api::api(node);

    // Start server
    info!("Starting Hostwatch API on {}", socket_address);
    axum::Server::bind(&socket_address)
        .serve(api.into_make_service())
        .await?;

    Ok(())
}
