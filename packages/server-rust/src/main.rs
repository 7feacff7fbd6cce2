//! tarot.vn backend server binary.

use tarot_server::config::Config;
use tarot_server::network::{shutdown_signal, ServerModule, ServiceInfo};
use tarot_server::{logging, version};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::init()?;
    logging::init(&config.log_level)?;

    info!(level = %config.log_level, "Logging initialized");
    info!(origins = ?config.allowed_origins(), "CORS allowed origins");

    let app_version = version::app_version();
    info!(
        version = %app_version,
        environment = %config.environment,
        pid = std::process::id(),
        "Starting tarot backend"
    );

    let info = ServiceInfo {
        description: config.service_description.clone(),
        version: app_version,
    };

    let mut server = ServerModule::new(config.network_config(), info);
    let port = server.start().await?;
    info!(host = %config.host, port, "Server listening");

    server.serve(shutdown_signal()).await?;

    info!("Server stopped");
    Ok(())
}
