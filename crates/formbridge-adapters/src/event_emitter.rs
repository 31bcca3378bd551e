//! Live event fan-out per §4.D step 3 / §5's isolation rule, backed by
//! `tokio::sync::broadcast`.
//!
//! `emit` never fails: a lagged or dropped receiver is the subscriber's
//! problem, not the publisher's — the durable event-store write (step 2
//! of the triple-write) remains the source of truth regardless of who is
//! listening live.

use async_trait::async_trait;
use tokio::sync::broadcast;

use formbridge_domain::IntakeEvent;
use formbridge_ports::EventEmitter;

/// Default capacity for the broadcast channel's ring buffer. A slow
/// subscriber that falls more than this many events behind starts missing
/// events rather than applying backpressure to writers — fan-out listeners
/// are advisory, per §5.
const DEFAULT_CAPACITY: usize = 1024;

pub struct BroadcastEventEmitter {
    sender: broadcast::Sender<IntakeEvent>,
}

impl BroadcastEventEmitter {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe a new live listener — e.g. an SSE/websocket handler in
    /// `formbridge-api`.
    pub fn subscribe(&self) -> broadcast::Receiver<IntakeEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastEventEmitter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventEmitter for BroadcastEventEmitter {
    async fn emit(&self, event: &IntakeEvent) {
        // `send` only errors when there are zero receivers — not a failure
        // worth surfacing, since nothing is listening live in that case.
        let _ = self.sender.send(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formbridge_domain::{Actor, EventKind, SubmissionId, SubmissionState};

    fn sample_event() -> IntakeEvent {
        IntakeEvent::new(
            EventKind::SubmissionCreated,
            SubmissionId::new(),
            Actor::system("test"),
            SubmissionState::Draft,
            serde_json::json!({}),
            1,
            chrono::Utc::now(),
        )
    }

    #[tokio::test]
    async fn emit_reaches_every_live_subscriber() {
        let emitter = BroadcastEventEmitter::new();
        let mut sub_a = emitter.subscribe();
        let mut sub_b = emitter.subscribe();

        emitter.emit(&sample_event()).await;

        assert!(sub_a.try_recv().is_ok());
        assert!(sub_b.try_recv().is_ok());
    }

    #[tokio::test]
    async fn emit_with_no_subscribers_does_not_panic_or_error() {
        let emitter = BroadcastEventEmitter::new();
        emitter.emit(&sample_event()).await;
    }
}
