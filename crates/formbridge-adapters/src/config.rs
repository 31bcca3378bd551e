//! Adapter-layer configuration — the storage/delivery knobs of §6's
//! Configuration table that need more than a primitive (retry policy,
//! which storage backend to wire up, the Postgres connection string).
//! Process wiring (bind address, tracing filter) lives in
//! `formbridge-api::config::ApiConfig`; this is the subset the adapters
//! crate's constructors need regardless of which binary wires them up.

use std::env;
use std::time::Duration as StdDuration;

use formbridge_domain::RetryPolicy;

use crate::storage_s3::S3StorageConfig;

/// Which upload storage backend to construct, if any. Per §6: "absent ⇒
/// upload ops return `invalid`" — `None` is a legitimate configuration,
/// not a misconfiguration.
#[derive(Debug, Clone)]
pub enum StorageBackendConfig {
    None,
    Local { root_dir: String, base_url: String },
    S3(S3StorageConfig),
}

#[derive(Debug, Clone)]
pub struct AdaptersConfig {
    /// `None` selects the in-memory event store; `Some` selects Postgres.
    pub database_url: Option<String>,
    pub storage_backend: StorageBackendConfig,
    /// HMAC-SHA256 signing secret for outbound webhook payloads per §4.I.
    pub signing_secret: Option<String>,
    pub retry_policy: RetryPolicy,
    pub token_ttl: StdDuration,
    pub max_entries: usize,
    pub expiry_interval_ms: u64,
    pub retry_interval_ms: u64,
}

impl AdaptersConfig {
    /// Load from environment, falling back to the defaults §6 names for
    /// every option it doesn't find. Mirrors the teacher's
    /// `ServiceConfig`/`from_env` pattern: typed fields, explicit
    /// defaults, no silent partial configuration.
    pub fn from_env() -> Self {
        let database_url = env::var("FORMBRIDGE_DATABASE_URL").ok();

        let storage_backend = match env::var("FORMBRIDGE_STORAGE_BACKEND").as_deref() {
            Ok("s3") => StorageBackendConfig::S3(S3StorageConfig {
                endpoint: env::var("FORMBRIDGE_S3_ENDPOINT")
                    .unwrap_or_else(|_| "http://localhost:9000".to_string()),
                region: env::var("FORMBRIDGE_S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
                access_key_id: env::var("FORMBRIDGE_S3_ACCESS_KEY_ID")
                    .unwrap_or_else(|_| "minioadmin".to_string()),
                secret_access_key: env::var("FORMBRIDGE_S3_SECRET_ACCESS_KEY")
                    .unwrap_or_else(|_| "minioadmin".to_string()),
                bucket: env::var("FORMBRIDGE_S3_BUCKET")
                    .unwrap_or_else(|_| "formbridge-uploads".to_string()),
                force_path_style: true,
                presign_ttl: StdDuration::from_secs(900),
            }),
            Ok("local") => StorageBackendConfig::Local {
                root_dir: env::var("FORMBRIDGE_LOCAL_STORAGE_DIR")
                    .unwrap_or_else(|_| "/tmp/formbridge-uploads".to_string()),
                base_url: env::var("FORMBRIDGE_LOCAL_STORAGE_BASE_URL")
                    .unwrap_or_else(|_| "http://localhost:3000/uploads".to_string()),
            },
            _ => StorageBackendConfig::None,
        };

        let retry_policy = RetryPolicy {
            max_retries: env_u32("FORMBRIDGE_RETRY_MAX_RETRIES", 5),
            initial_delay_ms: env_u64("FORMBRIDGE_RETRY_INITIAL_DELAY_MS", 1000),
            max_delay_ms: env_u64("FORMBRIDGE_RETRY_MAX_DELAY_MS", 60_000),
            backoff_multiplier: env::var("FORMBRIDGE_RETRY_BACKOFF_MULTIPLIER")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(2.0),
        };

        Self {
            database_url,
            storage_backend,
            signing_secret: env::var("FORMBRIDGE_WEBHOOK_SIGNING_SECRET").ok(),
            retry_policy,
            token_ttl: StdDuration::from_secs(env_u64("FORMBRIDGE_TOKEN_TTL_SECS", 7 * 24 * 3600)),
            max_entries: env_u64("FORMBRIDGE_MAX_ENTRIES", 100_000) as usize,
            expiry_interval_ms: env_u64("FORMBRIDGE_EXPIRY_INTERVAL_MS", 60_000),
            retry_interval_ms: env_u64("FORMBRIDGE_RETRY_INTERVAL_MS", 30_000),
        }
    }
}

impl Default for AdaptersConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            storage_backend: StorageBackendConfig::None,
            signing_secret: None,
            retry_policy: RetryPolicy::default(),
            token_ttl: StdDuration::from_secs(7 * 24 * 3600),
            max_entries: 100_000,
            expiry_interval_ms: 60_000,
            retry_interval_ms: 30_000,
        }
    }
}

fn env_u32(key: &str, default: u32) -> u32 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
