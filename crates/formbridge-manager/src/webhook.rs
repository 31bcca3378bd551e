//! Pure parts of the webhook delivery engine per §4.I, §6: payload
//! construction, HMAC-SHA256 signing/verification, and header merging.
//! No network access — the adapters crate's `WebhookEngine` owns the HTTP
//! client and calls into these functions.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use serde_json::Value;
use sha2::Sha256;

use formbridge_domain::{FieldAttribution, Submission};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Serialize)]
struct DeliveryMetadata {
    #[serde(rename = "createdAt")]
    created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    updated_at: DateTime<Utc>,
    #[serde(rename = "createdBy")]
    created_by: formbridge_domain::Actor,
}

#[derive(Debug, Serialize)]
struct DeliveryPayload {
    #[serde(rename = "submissionId")]
    submission_id: String,
    #[serde(rename = "intakeId")]
    intake_id: String,
    state: formbridge_domain::SubmissionState,
    fields: HashMap<String, Value>,
    #[serde(rename = "fieldAttribution")]
    field_attribution: HashMap<String, FieldAttribution>,
    metadata: DeliveryMetadata,
}

/// Build the outbound JSON body exactly as specified in §4.I:
/// `{ submissionId, intakeId, state, fields, fieldAttribution, metadata:
/// { createdAt, updatedAt, createdBy } }`.
pub fn build_payload(submission: &Submission) -> Vec<u8> {
    let payload = DeliveryPayload {
        submission_id: submission.submission_id.as_str().to_string(),
        intake_id: submission.intake_id.clone(),
        state: submission.state,
        fields: submission.fields.clone(),
        field_attribution: submission.field_attribution.clone(),
        metadata: DeliveryMetadata {
            created_at: submission.created_at,
            updated_at: submission.updated_at,
            created_by: submission.created_by.clone(),
        },
    };
    // A struct serialized to a `Vec<u8>` never fails — `serde_json` only
    // errors on non-finite floats or non-string map keys, neither of which
    // this shape can produce.
    serde_json::to_vec(&payload).expect("delivery payload is always serializable")
}

/// `hex(hmac_sha256(secret, body))` per §4.I/§6.
pub fn sign(body: &[u8], secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts a key of any length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Recompute the signature over `body` with `secret` and compare it,
/// constant-time, against `signature` (with any leading `sha256=` prefix
/// already stripped by the caller) per §6.
pub fn verify(body: &[u8], signature: &str, secret: &str) -> bool {
    let expected = sign(body, secret);
    constant_time_eq(expected.as_bytes(), signature.as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Standard headers for a delivery attempt, with destination-supplied
/// custom headers merged in — system headers win on conflict per §6.
pub fn build_headers(timestamp: DateTime<Utc>, signature: Option<&str>, destination_headers: &HashMap<String, String>) -> Vec<(String, String)> {
    let mut headers: HashMap<String, String> = destination_headers.clone();
    headers.insert("Content-Type".to_string(), "application/json".to_string());
    headers.insert("X-FormBridge-Timestamp".to_string(), timestamp.to_rfc3339());
    if let Some(sig) = signature {
        headers.insert("X-FormBridge-Signature".to_string(), format!("sha256={sig}"));
    }
    let mut pairs: Vec<(String, String)> = headers.into_iter().collect();
    pairs.sort();
    pairs
}
