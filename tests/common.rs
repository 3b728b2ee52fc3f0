#![allow(dead_code, clippy::unwrap_used, clippy::missing_panics_doc, unreachable_pub)]

use async_trait::async_trait;
use clap::Parser;
use ipbound_auth::AppBuilder;
use ipbound_auth::adapters::memory::refresh_token_store::InMemoryRefreshTokenStore;
use ipbound_auth::api::{MgmtState, app_router, mgmt_router};
use ipbound_auth::config::Config;
use ipbound_auth::services::ip_notifier::{IpChangeNotifier, NotifyError};
use serde_json::json;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex, Once};
use tokio::net::TcpListener;
use uuid::Uuid;

static INIT: Once = Once::new();

pub fn setup_tracing() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "warn".into())
            .add_directive("ipbound_auth=debug".parse().unwrap())
            .add_directive("sqlx=warn".parse().unwrap())
            .add_directive("tower=warn".parse().unwrap())
            .add_directive("hyper=warn".parse().unwrap())
            .add_directive("reqwest=warn".parse().unwrap());

        let _ = tracing_subscriber::fmt().with_env_filter(filter).with_test_writer().try_init();
    });
}

/// Test config with cheap hashing and rate limits high enough to never trigger.
pub fn get_test_config(refresh_token_ttl_secs: u64) -> Config {
    let refresh_ttl = refresh_token_ttl_secs.to_string();
    Config::try_parse_from([
        "ipbound-auth",
        "--jwt-secret",
        "test_secret",
        "--access-token-ttl-secs",
        "900",
        "--refresh-token-ttl-secs",
        refresh_ttl.as_str(),
        "--hash-memory-kib",
        "8",
        "--hash-iterations",
        "1",
        "--rate-limit-per-second",
        "10000",
        "--rate-limit-burst",
        "10000",
        "--notify-timeout-ms",
        "200",
        "--trusted-proxies",
        "127.0.0.1/32,::1/128",
    ])
    .unwrap()
}

pub type Call = (Uuid, IpAddr, IpAddr);

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    calls: Mutex<Vec<Call>>,
}

impl RecordingNotifier {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl IpChangeNotifier for RecordingNotifier {
    async fn notify_ip_change(&self, user_id: Uuid, old_ip: IpAddr, new_ip: IpAddr) -> Result<(), NotifyError> {
        self.calls.lock().unwrap().push((user_id, old_ip, new_ip));
        Ok(())
    }
}

pub struct TestApp {
    pub server_url: String,
    pub mgmt_url: String,
    pub client: reqwest::Client,
    pub store: Arc<InMemoryRefreshTokenStore>,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_config(get_test_config(3600)).await
    }

    pub async fn spawn_with_config(config: Config) -> Self {
        setup_tracing();

        let store = Arc::new(InMemoryRefreshTokenStore::new());
        let notifier = Arc::new(RecordingNotifier::default());

        let services = AppBuilder::new(config.clone())
            .with_store(Arc::clone(&store) as _)
            .with_notifier(Arc::clone(&notifier) as _)
            .build()
            .unwrap();

        let mgmt_app = mgmt_router(MgmtState { health_service: services.health_service.clone() });
        let app = app_router(&config, services);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await.unwrap();
        });

        let mgmt_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mgmt_addr = mgmt_listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(mgmt_listener, mgmt_app.into_make_service_with_connect_info::<SocketAddr>()).await.unwrap();
        });

        Self {
            server_url: format!("http://{addr}"),
            mgmt_url: format!("http://{mgmt_addr}"),
            client: reqwest::Client::new(),
            store,
            notifier,
        }
    }

    /// Requests a token pair as if the caller were at `client_ip`.
    pub async fn create_tokens(&self, user_id: Uuid, client_ip: &str) -> reqwest::Response {
        self.client
            .post(format!("{}/v1/auth/tokens", self.server_url))
            .header("x-forwarded-for", client_ip)
            .json(&json!({ "userId": user_id.to_string() }))
            .send()
            .await
            .unwrap()
    }

    pub async fn refresh(&self, refresh_token: &str, client_ip: &str) -> reqwest::Response {
        self.client
            .post(format!("{}/v1/auth/refresh", self.server_url))
            .header("x-forwarded-for", client_ip)
            .json(&json!({ "refreshToken": refresh_token }))
            .send()
            .await
            .unwrap()
    }

    /// Returns `(access_token, refresh_token)`.
    pub async fn issue(&self, user_id: Uuid, client_ip: &str) -> (String, String) {
        let resp = self.create_tokens(user_id, client_ip).await;
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        let json: serde_json::Value = resp.json().await.unwrap();
        (
            json["accessToken"].as_str().unwrap().to_string(),
            json["refreshToken"].as_str().unwrap().to_string(),
        )
    }
}
