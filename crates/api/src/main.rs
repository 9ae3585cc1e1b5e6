//! Crank Twin Telemetry Server - Main Entry Point

use api::{init_logging, run_server, ServerConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    info!("=== Crank Twin Telemetry v{} ===", env!("CARGO_PKG_VERSION"));

    // Optional config file path as the first argument
    let path = std::env::args().nth(1);
    let config = ServerConfig::load(path.as_deref())?;

    run_server(config).await?;

    Ok(())
}
