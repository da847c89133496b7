use service_core::observability::{init_tracing, shutdown_tracing};
use std::net::SocketAddr;
use tenancy_service::{build_router, config::TenancyConfig, services::metrics, startup};
use std::time::Duration;
use tokio::signal;

const RATE_LIMIT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), service_core::error::AppError> {
    // Load configuration - fail fast if invalid
    let config = TenancyConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    )?;

    metrics::init_metrics().map_err(|e| {
        service_core::error::AppError::ConfigError(anyhow::anyhow!(
            "Failed to register metrics: {}",
            e
        ))
    })?;

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting tenancy service"
    );

    let stores = startup::connect_stores(&config).await?;
    tracing::info!(backend = stores.accounts.backend(), "Storage initialized");

    let blacklist = startup::connect_blacklist(&config).await?;
    let email = startup::email_provider(&config)?;

    let state = startup::build_state(config.clone(), stores, email, blacklist)?;
    startup::spawn_rate_limit_cleanup(&state, RATE_LIMIT_CLEANUP_INTERVAL);
    let app = build_router(state);

    let addr: SocketAddr = config.common.bind_address().parse().map_err(|e| {
        service_core::error::AppError::ConfigError(anyhow::anyhow!(
            "Invalid bind address: {}",
            e
        ))
    })?;

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    shutdown_tracing();
    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
