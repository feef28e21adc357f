//! ISP billing API server
//!
//! ```bash
//! API_PORT=8080 API_DATABASE_URL=postgres://... cargo run --bin isp-billing-api
//! ```
//!
//! Settings are read from `API_*` variables; nested ones use a double
//! underscore, e.g. `API_TENANCY__BASE_DOMAIN`.

use std::net::SocketAddr;

use tokio::net::TcpListener;

use domain_integrations::GatewayRegistry;
use interface_api::startup::{connect_database, init_tracing, load_config};
use interface_api::{create_router, AppState, Ports};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;
    init_tracing(&config.log_level);

    tracing::info!(host = %config.host, port = %config.port, "starting ISP billing API");

    let pool = connect_database(&config, "isp-billing-api").await?;
    let ports = Ports::postgres(pool, &config)?;
    let addr: SocketAddr = config.server_addr().parse()?;

    // Gateway wire adapters register here once deployed
    let state = AppState::new(config, ports, GatewayRegistry::new());
    let app = create_router(state);

    tracing::info!(%addr, "server listening");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
