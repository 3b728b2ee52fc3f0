#![forbid(unsafe_code)]
#![deny(unused_must_use)]

use ipbound_auth::adapters::database::{self, refresh_token_repo::PgRefreshTokenStore};
use ipbound_auth::adapters::memory::refresh_token_store::InMemoryRefreshTokenStore;
use ipbound_auth::adapters::notify::logging::LoggingNotifier;
use ipbound_auth::api::MgmtState;
use ipbound_auth::config::Config;
use ipbound_auth::services::token_store::RefreshTokenStore;
use ipbound_auth::{AppBuilder, telemetry};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::Instrument;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load();
    let telemetry_guard = telemetry::init_telemetry(&config.telemetry)?;

    let boot_span = tracing::info_span!("boot_server");
    let (api_listener, mgmt_listener, app_router, mgmt_app, shutdown_rx) = async {
        // Phase 1: Infrastructure Setup
        let store: Arc<dyn RefreshTokenStore> = if let Some(url) = &config.database.url {
            let pool = database::init_pool(url, &config.database).await?;
            database::run_migrations(&pool).await?;
            Arc::new(PgRefreshTokenStore::new(pool))
        } else {
            tracing::warn!("No database configured; refresh tokens will not survive a restart");
            Arc::new(InMemoryRefreshTokenStore::new())
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        ipbound_auth::spawn_signal_handler(shutdown_tx);

        // Phase 2: Component Wiring
        let services = AppBuilder::new(config.clone())
            .with_store(store)
            .with_notifier(Arc::new(LoggingNotifier))
            .build()?;

        // Phase 3: Listeners and Routers
        let mgmt_app = ipbound_auth::api::mgmt_router(MgmtState { health_service: services.health_service.clone() });
        let app_router = ipbound_auth::api::app_router(&config, services);

        let api_addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
        let mgmt_addr: SocketAddr = format!("{}:{}", config.server.host, config.server.mgmt_port).parse()?;

        let api_listener = tokio::net::TcpListener::bind(api_addr).await?;
        let mgmt_listener = tokio::net::TcpListener::bind(mgmt_addr).await?;

        tracing::info!(address = %api_addr, "listening");
        tracing::info!(address = %mgmt_addr, "management server listening");

        Ok::<_, anyhow::Error>((api_listener, mgmt_listener, app_router, mgmt_app, shutdown_rx))
    }
    .instrument(boot_span)
    .await?;

    // Phase 4: Serve until a shutdown signal arrives
    let mut api_rx = shutdown_rx.clone();
    let api_server = axum::serve(api_listener, app_router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move {
            let _ = api_rx.wait_for(|&s| s).await;
        });

    let mut mgmt_rx = shutdown_rx.clone();
    let mgmt_server = axum::serve(mgmt_listener, mgmt_app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move {
            let _ = mgmt_rx.wait_for(|&s| s).await;
        });

    let servers = async { tokio::try_join!(api_server.into_future(), mgmt_server.into_future()) };

    // Phase 5: Bounded drain once shutdown is requested
    let mut drain_rx = shutdown_rx;
    let drain_timeout = Duration::from_secs(config.server.shutdown_timeout_secs);
    tokio::select! {
        result = servers => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Server error");
            }
        }
        () = async {
            let _ = drain_rx.wait_for(|&s| s).await;
            tokio::time::sleep(drain_timeout).await;
        } => {
            tracing::warn!("Timeout waiting for in-flight requests to finish.");
        }
    }

    tracing::info!("Server stopped");
    telemetry_guard.shutdown();
    Ok(())
}
