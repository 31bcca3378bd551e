//! Intake definitions — the JSON-Schema-shaped form contract per §3, §4.B.
//!
//! An [`IntakeDefinition`] is immutable process-wide catalog data: it is
//! registered once at startup (already normalized — schema normalization
//! from third-party formats is out of scope here) and never mutated by a
//! submission. The [`FieldSchema`] tree is deliberately a narrow subset of
//! JSON Schema: only the constraints the validator (§4.C) understands.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

/// A single field constraint node. Mirrors the JSON-Schema-shaped definition
/// in §3: `properties`, `required`, nested `object`/`array`, `enum`,
/// `format`, `pattern`, min/max, and file constraints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSchema {
    #[serde(rename = "type")]
    pub field_type: FieldType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub r#enum: Vec<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,

    // object
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub properties: HashMap<String, FieldSchema>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,

    // array
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<FieldSchema>>,

    // file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_types: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_count: Option<u32>,

    /// Opaque rendering hint — never inspected by the validator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
    File,
}

/// A condition gating submit into `needs_review` per §3, §9.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalGate {
    pub id: String,
    /// Restricted expression string evaluated over the submission's field
    /// map — see [`crate::approval_gate::evaluate`].
    pub condition: String,
    #[serde(default)]
    pub required: bool,
}

/// Where an accepted submission is delivered — a webhook destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Destination {
    pub url: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
}

/// A registered, versioned form definition per §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntakeDefinition {
    /// Lowercase-with-underscores identifier, `^[a-z][a-z0-9_]*$`.
    pub id: String,
    /// Semantic version string, e.g. `1.0.0`.
    pub version: String,
    pub schema: FieldSchema,
    pub destination: Destination,
    #[serde(default)]
    pub approval_gates: Vec<ApprovalGate>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntakeRegistrationError {
    #[error("invalid intake id {id:?}: must match ^[a-z][a-z0-9_]*$")]
    InvalidId { id: String },
    #[error("invalid semantic version {version:?} for intake {id:?}")]
    InvalidVersion { id: String, version: String },
}

impl IntakeDefinition {
    /// Validate registration-time invariants per §4.B: `id` matches
    /// `^[a-z][a-z0-9_]*$`, `version` is semver-shaped.
    pub fn validate_for_registration(&self) -> Result<(), IntakeRegistrationError> {
        if !is_valid_intake_id(&self.id) {
            return Err(IntakeRegistrationError::InvalidId { id: self.id.clone() });
        }
        if !is_valid_semver(&self.version) {
            return Err(IntakeRegistrationError::InvalidVersion {
                id: self.id.clone(),
                version: self.version.clone(),
            });
        }
        Ok(())
    }

    /// Walk a dot-path into `schema.properties`, returning the leaf schema
    /// if it exists. Used by the upload negotiator to confirm a field is a
    /// declared `file` field before issuing an upload URL.
    pub fn field_schema(&self, dot_path: &str) -> Option<&FieldSchema> {
        let mut current = &self.schema;
        for segment in dot_path.split('.') {
            current = current.properties.get(segment)?;
        }
        Some(current)
    }
}

/// In-memory process-wide catalog of registered intakes per §4.B.
///
/// Populated at startup from already-normalized definitions. Holds no
/// connections and does no I/O, so it lives alongside the other pure
/// domain types rather than behind a port trait.
pub struct IntakeRegistry {
    intakes: RwLock<HashMap<String, IntakeDefinition>>,
}

impl IntakeRegistry {
    pub fn new() -> Self {
        Self {
            intakes: RwLock::new(HashMap::new()),
        }
    }

    /// Register an intake, validating it per §4.B first.
    pub fn register(&self, intake: IntakeDefinition) -> Result<(), IntakeRegistrationError> {
        intake.validate_for_registration()?;
        self.intakes
            .write()
            .expect("intake registry lock poisoned")
            .insert(intake.id.clone(), intake);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<IntakeDefinition> {
        self.intakes
            .read()
            .expect("intake registry lock poisoned")
            .get(id)
            .cloned()
    }

    pub fn has(&self, id: &str) -> bool {
        self.intakes.read().expect("intake registry lock poisoned").contains_key(id)
    }

    pub fn list_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .intakes
            .read()
            .expect("intake registry lock poisoned")
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }
}

impl Default for IntakeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn is_valid_intake_id(id: &str) -> bool {
    let mut chars = id.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

fn is_valid_semver(version: &str) -> bool {
    let parts: Vec<&str> = version.split('.').collect();
    parts.len() == 3 && parts.iter().all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> IntakeDefinition {
        IntakeDefinition {
            id: "vendor_onboarding".to_string(),
            version: "1.0.0".to_string(),
            schema: FieldSchema {
                field_type: FieldType::Object,
                properties: HashMap::from([(
                    "legal_name".to_string(),
                    FieldSchema {
                        field_type: FieldType::String,
                        ..empty_schema()
                    },
                )]),
                required: vec!["legal_name".to_string()],
                ..empty_schema()
            },
            destination: Destination {
                url: "https://example.com/hook".to_string(),
                headers: HashMap::new(),
            },
            approval_gates: vec![],
        }
    }

    fn empty_schema() -> FieldSchema {
        FieldSchema {
            field_type: FieldType::Object,
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

    #[test]
    fn accepts_valid_id_and_version() {
        assert!(sample().validate_for_registration().is_ok());
    }

    #[test]
    fn rejects_uppercase_id() {
        let mut intake = sample();
        intake.id = "Vendor".to_string();
        assert!(matches!(
            intake.validate_for_registration(),
            Err(IntakeRegistrationError::InvalidId { .. })
        ));
    }

    #[test]
    fn rejects_non_semver_version() {
        let mut intake = sample();
        intake.version = "v1".to_string();
        assert!(matches!(
            intake.validate_for_registration(),
            Err(IntakeRegistrationError::InvalidVersion { .. })
        ));
    }

    #[test]
    fn field_schema_walks_dot_path() {
        let intake = sample();
        assert!(intake.field_schema("legal_name").is_some());
        assert!(intake.field_schema("missing").is_none());
    }

    #[test]
    fn registry_round_trips_a_registered_intake() {
        let registry = IntakeRegistry::new();
        registry.register(sample()).unwrap();
        assert!(registry.has("vendor_onboarding"));
        assert_eq!(registry.get("vendor_onboarding").unwrap().id, "vendor_onboarding");
        assert_eq!(registry.list_ids(), vec!["vendor_onboarding".to_string()]);
    }

    #[test]
    fn registry_rejects_invalid_intake_at_registration() {
        let registry = IntakeRegistry::new();
        let mut bad = sample();
        bad.id = "Bad-Id".to_string();
        assert!(registry.register(bad).is_err());
        assert!(!registry.has("Bad-Id"));
    }

    #[test]
    fn registry_get_is_none_for_unknown_id() {
        let registry = IntakeRegistry::new();
        assert!(registry.get("nope").is_none());
    }
}
