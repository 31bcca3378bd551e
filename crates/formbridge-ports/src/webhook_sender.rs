//! Outbound HTTP abstraction for webhook delivery per §4.I, §6.
//!
//! Kept as a port (rather than calling `reqwest` directly from the engine)
//! so dry-run mode and delivery-engine tests never need a live socket.

use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct WebhookRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct WebhookResponse {
    pub status_code: u16,
    pub body: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum WebhookSendError {
    #[error("network error: {message}")]
    Network { message: String },
    #[error("request timed out")]
    Timeout,
}

#[async_trait]
pub trait WebhookSender: Send + Sync {
    async fn send(&self, request: WebhookRequest) -> Result<WebhookResponse, WebhookSendError>;
}
