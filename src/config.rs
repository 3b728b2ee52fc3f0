use clap::{Args, Parser, ValueEnum};
use ipnetwork::IpNetwork;

/// Upper bound for either token TTL (100 years).
pub const MAX_TTL_SECS: u64 = 100 * 365 * 24 * 60 * 60;

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Config {
    #[command(flatten)]
    pub server: ServerConfig,

    #[command(flatten)]
    pub database: DatabaseConfig,

    #[command(flatten)]
    pub auth: AuthConfig,

    #[command(flatten)]
    pub notifications: NotificationConfig,

    #[command(flatten)]
    pub rate_limit: RateLimitConfig,

    #[command(flatten)]
    pub health: HealthConfig,

    #[command(flatten)]
    pub telemetry: TelemetryConfig,
}

#[derive(Clone, Debug, Args)]
pub struct ServerConfig {
    /// Host to listen on
    #[arg(long, env = "AUTH_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "AUTH_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Port for the management server (health probes)
    #[arg(long, env = "AUTH_MGMT_PORT", default_value_t = 9090)]
    pub mgmt_port: u16,

    /// Maximum time a single request may take before it is aborted
    #[arg(long, env = "AUTH_REQUEST_TIMEOUT_SECS", default_value_t = 10)]
    pub request_timeout_secs: u64,

    /// How long to wait for in-flight requests during shutdown
    #[arg(long, env = "AUTH_SHUTDOWN_TIMEOUT_SECS", default_value_t = 5)]
    pub shutdown_timeout_secs: u64,

    /// Comma-separated list of CIDRs to trust for X-Forwarded-For IP extraction.
    /// Tokens are bound to the resolved address, so list only your own proxies.
    #[arg(
        long,
        env = "AUTH_TRUSTED_PROXIES",
        default_value = "127.0.0.1/32,::1/128",
        value_delimiter = ','
    )]
    pub trusted_proxies: Vec<IpNetwork>,
}

#[derive(Clone, Debug, Args)]
pub struct DatabaseConfig {
    /// Database connection URL. When unset, refresh tokens are kept in memory.
    #[arg(long = "database-url", env = "AUTH_DATABASE_URL")]
    pub url: Option<String>,

    /// Maximum number of pooled connections
    #[arg(long, env = "AUTH_DB_MAX_CONNECTIONS", default_value_t = 20)]
    pub max_connections: u32,

    /// Minimum number of idle connections kept open
    #[arg(long, env = "AUTH_DB_MIN_CONNECTIONS", default_value_t = 2)]
    pub min_connections: u32,

    /// Time to wait for a free connection
    #[arg(long, env = "AUTH_DB_ACQUIRE_TIMEOUT_SECS", default_value_t = 3)]
    pub acquire_timeout_secs: u64,

    /// Idle connections are closed after this long
    #[arg(long, env = "AUTH_DB_IDLE_TIMEOUT_SECS", default_value_t = 600)]
    pub idle_timeout_secs: u64,

    /// Connections are recycled after this long
    #[arg(long, env = "AUTH_DB_MAX_LIFETIME_SECS", default_value_t = 1800)]
    pub max_lifetime_secs: u64,
}

#[derive(Clone, Debug, Args)]
pub struct AuthConfig {
    /// Secret key for access token signing (HS512)
    #[arg(
        long,
        env = "AUTH_JWT_SECRET",
        hide_env_values = true,
        value_parser = clap::builder::NonEmptyStringValueParser::new()
    )]
    pub jwt_secret: String,

    /// Access token time-to-live in seconds
    #[arg(long, env = "AUTH_ACCESS_TOKEN_TTL_SECS", value_parser = clap::value_parser!(u64).range(..=MAX_TTL_SECS))]
    pub access_token_ttl_secs: u64,

    /// Refresh token time-to-live in seconds
    #[arg(long, env = "AUTH_REFRESH_TOKEN_TTL_SECS", value_parser = clap::value_parser!(u64).range(..=MAX_TTL_SECS))]
    pub refresh_token_ttl_secs: u64,

    /// Argon2 memory cost in KiB for refresh secret hashing
    #[arg(long, env = "AUTH_HASH_MEMORY_KIB", default_value_t = 19_456)]
    pub hash_memory_kib: u32,

    /// Argon2 iteration count for refresh secret hashing
    #[arg(long, env = "AUTH_HASH_ITERATIONS", default_value_t = 2)]
    pub hash_iterations: u32,

    /// Argon2 degree of parallelism for refresh secret hashing
    #[arg(long, env = "AUTH_HASH_PARALLELISM", default_value_t = 1)]
    pub hash_parallelism: u32,
}

#[derive(Clone, Debug, Args)]
pub struct NotificationConfig {
    /// Upper bound on a single IP-change notification attempt
    #[arg(long = "notify-timeout-ms", env = "AUTH_NOTIFY_TIMEOUT_MS", default_value_t = 2000)]
    pub timeout_ms: u64,
}

#[derive(Clone, Debug, Args)]
pub struct RateLimitConfig {
    /// Requests per second allowed per client IP on the token endpoints
    #[arg(long = "rate-limit-per-second", env = "AUTH_RATE_LIMIT_PER_SECOND", default_value_t = 5)]
    pub per_second: u32,

    /// Burst allowance per client IP on the token endpoints
    #[arg(long = "rate-limit-burst", env = "AUTH_RATE_LIMIT_BURST", default_value_t = 10)]
    pub burst: u32,
}

#[derive(Clone, Debug, Args)]
pub struct HealthConfig {
    /// Timeout for the storage readiness check
    #[arg(long = "health-store-timeout-ms", env = "AUTH_HEALTH_STORE_TIMEOUT_MS", default_value_t = 2000)]
    pub store_timeout_ms: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Debug, Args)]
pub struct TelemetryConfig {
    /// OTLP collector endpoint; export is disabled when unset
    #[arg(long, env = "AUTH_OTLP_ENDPOINT")]
    pub otlp_endpoint: Option<String>,

    /// Log output format
    #[arg(long, env = "AUTH_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Config {
    #[must_use]
    pub fn load() -> Self {
        Self::parse()
    }
}
