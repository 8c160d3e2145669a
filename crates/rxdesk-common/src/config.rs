//! Application configuration loaded from environment variables and config files.
//!
//! Supports `.env` files for development and environment variables for production.
//! Config precedence: env vars > .env file > config.toml > defaults

use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::Deserialize;

/// Load the application configuration from the environment.
///
/// Should be called once at application startup; the result is shared through
/// `AppState` rather than a global.
pub fn init() -> Result<AppConfig, config::ConfigError> {
    // Load .env file if present (development)
    let _ = dotenvy::dotenv();

    let cfg = config::Config::builder()
        // Defaults
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 8080)?
        .set_default("server.gateway_port", 8081)?
        .set_default("server.public_url", "http://localhost:8080")?
        .set_default("server.cors_origins", Vec::<String>::new())?
        .set_default("server.request_timeout_secs", 30)?
        .set_default("server.max_body_bytes", 26_214_400)? // 25MB
        .set_default("database.max_connections", 20)?
        .set_default("database.min_connections", 2)?
        .set_default("auth.access_token_ttl_secs", 3600)? // 1 hour
        .set_default("auth.refresh_token_ttl_secs", 2_592_000)? // 30 days
        .set_default("storage.upload_dir", "./data/uploads")?
        .set_default("storage.max_upload_bytes", 10_485_760)? // 10MB
        .set_default("pricing.tax_rate", "0.00")?
        .set_default("pricing.delivery_fee", "5.99")?
        .set_default("pricing.free_delivery_threshold", "50.00")?
        .set_default("pricing.currency", "usd")?
        .set_default("dashboard.low_stock_threshold", 10)?
        .set_default("dashboard.cache_ttl_secs", 10)?
        .set_default("gateway.heartbeat_interval_ms", 45_000)?
        .set_default("gateway.reauth_interval_secs", 30)?
        .set_default("gateway.broadcast_capacity", 1024)?
        // Optional config file
        .add_source(config::File::with_name("config").required(false))
        // Environment variables (RXDESK_SERVER__PORT, RXDESK_DATABASE__URL, etc.)
        .add_source(
            config::Environment::with_prefix("RXDESK")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("server.cors_origins")
                .try_parsing(true),
        )
        .build()?;

    cfg.try_deserialize()
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub storage: StorageConfig,
    pub pricing: PricingConfig,
    #[serde(default)]
    pub payments: PaymentsConfig,
    pub dashboard: DashboardConfig,
    pub gateway: GatewayConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub gateway_port: u16,
    /// Externally reachable base URL, used to build links to uploaded files.
    pub public_url: String,
    /// Allowed CORS origins. Empty means any origin.
    pub cors_origins: Vec<String>,
    pub request_timeout_secs: u64,
    pub max_body_bytes: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// JWT signing secret (HS256): should be 256+ bits of entropy
    pub jwt_secret: SecretString,
    /// Access token TTL in seconds
    pub access_token_ttl_secs: u64,
    /// Refresh token TTL in seconds
    pub refresh_token_ttl_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Root directory for uploads. Public images live under `public/`,
    /// prescription scans under `prescriptions/` (never served statically).
    pub upload_dir: String,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PricingConfig {
    /// Sales tax as a fraction (0.0825 = 8.25%)
    pub tax_rate: Decimal,
    pub delivery_fee: Decimal,
    pub free_delivery_threshold: Decimal,
    /// ISO currency code passed to the payments provider
    pub currency: String,
}

/// Stripe credentials. Every field is optional: payments are disabled when
/// `secret_key` is absent.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct PaymentsConfig {
    pub secret_key: Option<SecretString>,
    pub publishable_key: Option<String>,
    pub webhook_secret: Option<SecretString>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    pub low_stock_threshold: i32,
    pub cache_ttl_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    pub heartbeat_interval_ms: u64,
    /// How often a gateway session re-checks its token expiry
    pub reauth_interval_secs: u64,
    pub broadcast_capacity: usize,
}
