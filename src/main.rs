use std::net::SocketAddr;
use tracing::{error, info};

use dual_query_backend::api::routes;
use dual_query_backend::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging; RUST_LOG wins over the configured level
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .init();

    info!("Starting server on {}", config.server_address());
    if config.execution.read_only {
        info!("Read-only guard enabled for generated queries");
    }

    let addr: SocketAddr = config.server_address().parse()?;
    let state = routes::build_state(config).map_err(|e| {
        error!("Failed to initialize services: {}", e);
        e
    })?;

    // Create router with state
    let app = routes::create_router_with_state(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
