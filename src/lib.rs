#![forbid(unsafe_code)]
#![deny(unused_must_use)]

pub mod adapters;
pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod services;
pub mod telemetry;

use crate::adapters::memory::refresh_token_store::InMemoryRefreshTokenStore;
use crate::adapters::notify::logging::LoggingNotifier;
use crate::api::ServiceContainer;
use crate::config::Config;
use crate::services::health_service::HealthService;
use crate::services::ip_notifier::IpChangeNotifier;
use crate::services::rate_limit_service::RateLimitService;
use crate::services::token_service::TokenService;
use crate::services::token_store::RefreshTokenStore;
use std::sync::Arc;
use tokio::sync::watch;

/// Wires the services together. Unset collaborators fall back to the in-memory store
/// and the logging notifier.
#[derive(Debug)]
pub struct AppBuilder {
    config: Config,
    store: Option<Arc<dyn RefreshTokenStore>>,
    notifier: Option<Arc<dyn IpChangeNotifier>>,
}

impl AppBuilder {
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config, store: None, notifier: None }
    }

    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn RefreshTokenStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn IpChangeNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// # Errors
    /// Returns an error if the token service configuration is invalid.
    pub fn build(self) -> anyhow::Result<ServiceContainer> {
        let store = self.store.unwrap_or_else(|| Arc::new(InMemoryRefreshTokenStore::new()));
        let notifier = self.notifier.unwrap_or_else(|| Arc::new(LoggingNotifier));

        let token_service =
            TokenService::new(&self.config.auth, &self.config.notifications, Arc::clone(&store), notifier)?;
        let rate_limit_service = RateLimitService::new(self.config.server.trusted_proxies.clone());
        let health_service = HealthService::new(store, self.config.health.clone());

        Ok(ServiceContainer { token_service, rate_limit_service, health_service })
    }
}

/// Flips the shutdown channel on SIGINT or SIGTERM.
pub fn spawn_signal_handler(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to listen for SIGTERM");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => {},
            () = terminate => {},
        }

        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });
}
