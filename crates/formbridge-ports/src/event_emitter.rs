//! Live event fan-out per §4.D's triple-write step 3, §5's isolation rule.
//!
//! `emit` never returns an error: one listener's failure must not prevent
//! others from running and must not roll back the durable event-store
//! write, which is the source of truth.

use async_trait::async_trait;
use formbridge_domain::IntakeEvent;

#[async_trait]
pub trait EventEmitter: Send + Sync {
    async fn emit(&self, event: &IntakeEvent);
}
