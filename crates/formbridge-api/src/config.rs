//! Process-wide configuration for the `formbridge-api` binary per §6's
//! Configuration table: `baseUrl`, `tokenTTL`, `maxEntries`,
//! `expiryIntervalMs`, `retryIntervalMs`, `signingSecret`, `retryPolicy`,
//! and `storageBackend` live in [`formbridge_adapters::AdaptersConfig`];
//! this struct carries only the ambient process knobs (bind address, log
//! filter, where to load the startup intake catalog from) that
//! `AdaptersConfig` has no reason to know about.

use std::env;

use formbridge_adapters::AdaptersConfig;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    /// Embedded in handoff URLs per §6's `baseUrl` option.
    pub base_url: String,
    pub log_filter: String,
    /// Path to a JSON file of `IntakeDefinition`s to register at startup.
    /// Absent ⇒ the bundled demo intake is registered instead, so the
    /// binary is runnable out of the box per §4.B ("populated at startup
    /// from already-normalized definitions").
    pub intakes_path: Option<String>,
    pub adapters: AdaptersConfig,
}

impl ApiConfig {
    pub fn from_env() -> Self {
        let port = env::var("FORMBRIDGE_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3000);
        let host = env::var("FORMBRIDGE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let base_url = env::var("FORMBRIDGE_BASE_URL").unwrap_or_else(|_| format!("http://localhost:{port}"));

        Self {
            host,
            port,
            base_url,
            log_filter: env::var("FORMBRIDGE_LOG").unwrap_or_else(|_| "formbridge_api=info,tower_http=info".to_string()),
            intakes_path: env::var("FORMBRIDGE_INTAKES_PATH").ok(),
            adapters: AdaptersConfig::from_env(),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
