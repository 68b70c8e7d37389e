use anyhow::{Context, Result};
use clap::Parser;
use core_runtime::logging::init_logging;
use drive_server::audit::spawn_event_logger;
use drive_server::cli::Args;
use drive_server::{create_router, AppState};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.logging_config())?;

    let config = args
        .app_config()
        .with_context(|| {
            format!(
                "Invalid configuration (credentials: {})",
                args.credentials.display()
            )
        })?;
    let bind_addr = config.bind_addr;

    let service = core_service::bootstrap_desktop(config)?;
    spawn_event_logger(service.event_bus());
    let app = create_router(AppState::new(service));

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    info!(addr = %bind_addr, "Drive manager listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received, draining connections..."),
        Err(e) => {
            warn!(error = %e, "Cannot listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}
