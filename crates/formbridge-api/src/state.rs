//! Process-wide application state: wires the pure domain/ports/manager
//! crates to concrete adapters and holds the handles the background
//! schedulers need to run independently of any single request.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use tracing::{info, warn};

use formbridge_adapters::{
    AdaptersConfig, BroadcastEventEmitter, InMemoryDeliveryQueue, InMemoryEventStore, InMemorySubmissionStore,
    LocalStorageBackend, PostgresEventStore, ReqwestWebhookSender, S3StorageBackend, StorageBackendConfig,
    WebhookEngine, WebhookEngineConfig, WebhookRetryScheduler,
};
use formbridge_domain::{ApprovalGate, Destination, FieldSchema, FieldType, IntakeDefinition, IntakeRegistry};
use formbridge_manager::{ApprovalManager, ExpiryScheduler, ExpirySchedulerConfig, SubmissionManager, ToolSurfaceAdapter, UploadNegotiator};
use formbridge_ports::{Clock, DeliveryQueue, EventEmitter, EventStore, StorageBackend, SubmissionStore, SystemClock};

use crate::config::ApiConfig;

pub struct AppState {
    pub intakes: Arc<IntakeRegistry>,
    pub submissions: Arc<dyn SubmissionStore>,
    pub events: Arc<dyn EventStore>,
    pub delivery_queue: Arc<dyn DeliveryQueue>,
    pub emitter: Arc<dyn EventEmitter>,
    pub clock: Arc<dyn Clock>,
    pub submission_manager: Arc<SubmissionManager>,
    pub approval_manager: Arc<ApprovalManager>,
    pub upload_negotiator: Arc<UploadNegotiator>,
    pub tool_adapter: Arc<ToolSurfaceAdapter>,
    pub webhook_engine: Arc<WebhookEngine>,
    pub expiry_scheduler: Arc<ExpiryScheduler>,
    pub retry_scheduler: Arc<WebhookRetryScheduler>,
    pub base_url: String,
}

impl AppState {
    pub async fn bootstrap(config: &ApiConfig) -> Arc<Self> {
        let intakes = Arc::new(IntakeRegistry::new());
        register_startup_intakes(&intakes, config.intakes_path.as_deref());

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let submissions: Arc<dyn SubmissionStore> = Arc::new(InMemorySubmissionStore::new());
        let delivery_queue: Arc<dyn DeliveryQueue> = Arc::new(InMemoryDeliveryQueue::new());
        let emitter: Arc<dyn EventEmitter> = Arc::new(BroadcastEventEmitter::new());

        let events: Arc<dyn EventStore> = match &config.adapters.database_url {
            Some(url) => match PostgresEventStore::connect(url).await {
                Ok(store) => {
                    if let Err(e) = store.ensure_schema().await {
                        warn!(error = %e, "failed to ensure Postgres event store schema, falling back to in-memory");
                        Arc::new(InMemoryEventStore::new())
                    } else {
                        info!("durable event store: Postgres");
                        Arc::new(store)
                    }
                }
                Err(e) => {
                    warn!(error = %e, "failed to connect to Postgres, falling back to in-memory event store");
                    Arc::new(InMemoryEventStore::new())
                }
            },
            None => Arc::new(InMemoryEventStore::new()),
        };

        let storage: Option<Arc<dyn StorageBackend>> = build_storage_backend(&config.adapters).await;

        let token_ttl = Duration::from_std(config.adapters.token_ttl).unwrap_or_else(|_| Duration::days(7));

        let submission_manager = Arc::new(SubmissionManager::new(
            Arc::clone(&intakes),
            Arc::clone(&submissions),
            Arc::clone(&events),
            Arc::clone(&emitter),
            Arc::clone(&clock),
            token_ttl,
            config.base_url.clone(),
        ));

        let approval_manager = Arc::new(ApprovalManager::new(
            Arc::clone(&intakes),
            Arc::clone(&submissions),
            Arc::clone(&events),
            Arc::clone(&emitter),
            Arc::clone(&delivery_queue),
            Arc::clone(&clock),
        ));

        let upload_negotiator = Arc::new(UploadNegotiator::new(
            Arc::clone(&intakes),
            Arc::clone(&submissions),
            Arc::clone(&events),
            Arc::clone(&emitter),
            storage,
            Arc::clone(&clock),
        ));

        let tool_adapter = Arc::new(ToolSurfaceAdapter::new(Arc::clone(&submission_manager), Arc::clone(&upload_negotiator)));

        let webhook_engine = Arc::new(WebhookEngine::new(
            Arc::new(ReqwestWebhookSender::new()),
            Arc::clone(&delivery_queue),
            Arc::clone(&submissions),
            Arc::clone(&events),
            Arc::clone(&emitter),
            Arc::clone(&clock),
            WebhookEngineConfig {
                retry_policy: config.adapters.retry_policy,
                signing_secret: config.adapters.signing_secret.clone(),
            },
        ));

        let expiry_scheduler = Arc::new(ExpiryScheduler::new(
            Arc::clone(&submissions),
            Arc::clone(&events),
            Arc::clone(&emitter),
            Arc::clone(&clock),
            ExpirySchedulerConfig {
                tick_interval: StdDuration::from_millis(config.adapters.expiry_interval_ms),
                max_entries: config.adapters.max_entries,
            },
        ));

        let retry_scheduler = Arc::new(WebhookRetryScheduler::new(
            Arc::clone(&webhook_engine),
            Arc::clone(&delivery_queue),
            Arc::clone(&clock),
            StdDuration::from_millis(config.adapters.retry_interval_ms),
        ));

        Arc::new(Self {
            intakes,
            submissions,
            events,
            delivery_queue,
            emitter,
            clock,
            submission_manager,
            approval_manager,
            upload_negotiator,
            tool_adapter,
            webhook_engine,
            expiry_scheduler,
            retry_scheduler,
            base_url: config.base_url.clone(),
        })
    }
}

async fn build_storage_backend(config: &AdaptersConfig) -> Option<Arc<dyn StorageBackend>> {
    match &config.storage_backend {
        StorageBackendConfig::None => {
            warn!("no storage backend configured; upload negotiation will return `invalid` per §6");
            None
        }
        StorageBackendConfig::Local { root_dir, base_url } => {
            Some(Arc::new(LocalStorageBackend::new(root_dir.into(), base_url.clone())))
        }
        StorageBackendConfig::S3(s3_config) => Some(Arc::new(S3StorageBackend::new(s3_config.clone()).await)),
    }
}

/// Register the intakes named in `intakes_path` (a JSON array of
/// `IntakeDefinition`), or a single bundled demo intake — `vendor_onboarding`,
/// matching spec §8 scenario 1/2's literal example — when no path is
/// configured, so the binary is runnable with zero setup.
fn register_startup_intakes(registry: &IntakeRegistry, intakes_path: Option<&str>) {
    if let Some(path) = intakes_path {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<Vec<IntakeDefinition>>(&contents) {
                Ok(defs) => {
                    for def in defs {
                        let id = def.id.clone();
                        match registry.register(def) {
                            Ok(()) => info!(intake_id = %id, "registered intake from {path}"),
                            Err(e) => warn!(intake_id = %id, error = %e, "skipping invalid intake definition"),
                        }
                    }
                    return;
                }
                Err(e) => warn!(error = %e, "failed to parse {path} as a JSON array of intake definitions"),
            },
            Err(e) => warn!(error = %e, "failed to read intakes file {path}"),
        }
    }

    registry
        .register(vendor_onboarding_demo_intake())
        .expect("bundled demo intake is always valid");
    info!("no FORMBRIDGE_INTAKES_PATH configured; registered the bundled vendor_onboarding demo intake");
}

fn string_field() -> FieldSchema {
    FieldSchema {
        field_type: FieldType::String,
        format: None,
        pattern: None,
        r#enum: vec![],
        min_length: None,
        max_length: None,
        minimum: None,
        maximum: None,
        properties: HashMap::new(),
        required: vec![],
        items: None,
        max_size: None,
        allowed_types: vec![],
        max_count: None,
        hint: None,
    }
}

fn number_field() -> FieldSchema {
    FieldSchema {
        field_type: FieldType::Number,
        ..string_field()
    }
}

/// The walkthrough intake from spec §8's end-to-end scenarios: an agent
/// hands off vendor-onboarding fields to a human, who supplies
/// `annual_revenue`; a revenue above 1,000,000 routes the submission into
/// `needs_review` via the `high_revenue_approval` gate.
fn vendor_onboarding_demo_intake() -> IntakeDefinition {
    let mut properties = HashMap::new();
    properties.insert("legal_name".to_string(), string_field());
    properties.insert("country".to_string(), string_field());
    properties.insert("tax_id".to_string(), string_field());
    properties.insert("annual_revenue".to_string(), number_field());
    properties.insert("employees".to_string(), number_field());

    IntakeDefinition {
        id: "vendor_onboarding".to_string(),
        version: "1.0.0".to_string(),
        schema: FieldSchema {
            field_type: FieldType::Object,
            properties,
            required: vec!["legal_name".to_string(), "country".to_string(), "tax_id".to_string()],
            ..string_field()
        },
        destination: Destination {
            url: "https://example.com/webhooks/vendor-onboarding".to_string(),
            headers: HashMap::new(),
        },
        approval_gates: vec![ApprovalGate {
            id: "high_revenue_approval".to_string(),
            condition: "annual_revenue > 1000000".to_string(),
            required: true,
        }],
    }
}
