use std::time::Duration;

/// Connection settings for the external Gesuch processing microservice.
/// Injected into the client at construction so tests can substitute a
/// fake endpoint or an unroutable address.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub base_url: String,
    pub api_key: String,
    /// Base URL this app is reachable at; webhook callback URLs are built
    /// from it (e.g. `{callback_base}/api/webhooks/gesuch-processed`).
    pub callback_base: String,
    pub request_timeout: Duration,
    pub status_timeout: Duration,
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: env_or("GESUCH_SERVICE_URL", "http://127.0.0.1:5000"),
            api_key: env_or("GESUCH_SERVICE_API_KEY", ""),
            callback_base: env_or("CALLBACK_BASE_URL", "http://127.0.0.1:8080"),
            request_timeout: Duration::from_secs(env_secs("GESUCH_SERVICE_TIMEOUT_SECS", 30)),
            status_timeout: Duration::from_secs(env_secs("GESUCH_SERVICE_STATUS_TIMEOUT_SECS", 10)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub database_path: String,
    /// Shared secret for inbound webhook signatures. `None` disables
    /// verification (development only; loudly logged).
    pub webhook_secret: Option<String>,
    pub service: ServiceConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let webhook_secret = std::env::var("WEBHOOK_SECRET")
            .ok()
            .filter(|s| !s.is_empty());
        Self {
            bind_addr: env_or("BIND_ADDR", "127.0.0.1:8080"),
            database_path: env_or("DATABASE_PATH", "data/app.db"),
            webhook_secret,
            service: ServiceConfig::from_env(),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_secs(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
