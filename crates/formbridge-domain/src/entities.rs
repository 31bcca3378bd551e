//! Domain entities — actors and opaque identifiers per §3, §4.A
//!
//! Per §4.A, identifier/token generators mint stably-prefixed opaque strings.
//! Token comparisons must run in constant time: candidates of a different
//! length are rejected immediately (the length itself is not secret per §9),
//! but the byte-by-byte comparison never exits early on equal-length inputs.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Actor kind per §3 — who last touched a submission or field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    Agent,
    Human,
    System,
}

/// Actor identity per §3. Immutable once attached to an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub kind: ActorKind,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl Actor {
    pub fn system(id: impl Into<String>) -> Self {
        Self {
            kind: ActorKind::System,
            id: id.into(),
            name: None,
            metadata: None,
        }
    }
}

macro_rules! opaque_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Mint a fresh identifier with the stable prefix.
            pub fn new() -> Self {
                Self(format!(concat!($prefix, "{}"), Ulid::new()))
            }

            pub fn from_string(s: String) -> Self {
                Self(s)
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

opaque_id!(SubmissionId, "sub_");
opaque_id!(EventId, "evt_");
opaque_id!(DeliveryId, "dlv_");
opaque_id!(UploadId, "upl_");

/// Opaque rotating bearer credential per §3 / §4.A.
///
/// Not a ULID: resume tokens need ≥128 bits of cryptographically random
/// entropy, not a sortable timestamp-prefixed identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResumeToken(String);

impl ResumeToken {
    /// Mint a fresh token: `rtok_` followed by 32 hex characters (128 bits).
    pub fn new() -> Self {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(format!("rtok_{}", hex::encode(bytes)))
    }

    pub fn from_string(s: String) -> Self {
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Constant-time equality against a candidate token.
    ///
    /// Unequal-length candidates are rejected immediately — the length is
    /// not secret — but the byte comparison for equal-length candidates
    /// never short-circuits on the first differing byte, so the total
    /// execution time is independent of where the strings diverge.
    pub fn constant_time_eq(&self, candidate: &str) -> bool {
        let a = self.0.as_bytes();
        let b = candidate.as_bytes();
        if a.len() != b.len() {
            return false;
        }
        let mut diff: u8 = 0;
        for (x, y) in a.iter().zip(b.iter()) {
            diff |= x ^ y;
        }
        diff == 0
    }
}

impl Default for ResumeToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ResumeToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submission_id_has_stable_prefix() {
        let id = SubmissionId::new();
        assert!(id.as_str().starts_with("sub_"));
    }

    #[test]
    fn resume_token_has_stable_prefix_and_entropy() {
        let a = ResumeToken::new();
        let b = ResumeToken::new();
        assert!(a.as_str().starts_with("rtok_"));
        assert_ne!(a, b);
        // 16 bytes of entropy hex-encoded = 32 chars, plus the prefix.
        assert_eq!(a.as_str().len(), "rtok_".len() + 32);
    }

    #[test]
    fn constant_time_eq_matches_equal_tokens() {
        let t = ResumeToken::new();
        assert!(t.constant_time_eq(t.as_str()));
    }

    #[test]
    fn constant_time_eq_rejects_different_length() {
        let t = ResumeToken::new();
        assert!(!t.constant_time_eq("rtok_short"));
    }

    #[test]
    fn constant_time_eq_rejects_same_length_mismatch() {
        let t = ResumeToken::new();
        let mut mutated = t.as_str().to_string();
        let last = mutated.pop().unwrap();
        let replacement = if last == 'a' { 'b' } else { 'a' };
        mutated.push(replacement);
        assert!(!t.constant_time_eq(&mutated));
    }
}
