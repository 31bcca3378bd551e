//! Delivery records per §3 — owned by the delivery queue (§4.I).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::{DeliveryId, SubmissionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub delivery_id: DeliveryId,
    pub submission_id: SubmissionId,
    pub destination_url: String,
    pub status: DeliveryStatus,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_attempt_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_retry_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeliveryRecord {
    pub fn pending(submission_id: SubmissionId, destination_url: String, now: DateTime<Utc>) -> Self {
        Self {
            delivery_id: DeliveryId::new(),
            submission_id,
            destination_url,
            status: DeliveryStatus::Pending,
            attempts: 0,
            created_at: now,
            last_attempt_at: None,
            next_retry_at: None,
            status_code: None,
            error: None,
        }
    }
}

/// Retry policy per §4.I: `delay(attempt) = min(maxDelay, initial *
/// multiplier^(attempt-1))`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay_ms: 1000,
            max_delay_ms: 60_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay before the `attempt`-th retry (1-indexed: the delay that
    /// follows the first failed attempt is `delay(1)`).
    pub fn delay_ms(&self, attempt: u32) -> u64 {
        let exp = self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
        let raw = self.initial_delay_ms as f64 * exp;
        (raw.min(self.max_delay_ms as f64)) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_grows_exponentially_until_the_cap() {
        let policy = RetryPolicy {
            max_retries: 5,
            initial_delay_ms: 1000,
            max_delay_ms: 60_000,
            backoff_multiplier: 2.0,
        };
        assert_eq!(policy.delay_ms(1), 1000);
        assert_eq!(policy.delay_ms(2), 2000);
        assert_eq!(policy.delay_ms(3), 4000);
        assert_eq!(policy.delay_ms(4), 8000);
        assert_eq!(policy.delay_ms(5), 16000);
    }

    #[test]
    fn delay_is_capped_at_max_delay() {
        let policy = RetryPolicy {
            max_retries: 10,
            initial_delay_ms: 1000,
            max_delay_ms: 5000,
            backoff_multiplier: 2.0,
        };
        assert_eq!(policy.delay_ms(10), 5000);
    }
}
