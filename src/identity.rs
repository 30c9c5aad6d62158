use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One candidate identity harvested from a single source file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatientIdentity {
    /// Unique within the producing source (file path, message control id, …).
    pub source_id: String,
    pub source_system: String,
    pub full_name: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    /// ISO `YYYY-MM-DD`.
    pub birth_date: Option<String>,
    pub gender: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub mrn: Option<String>,
    pub abha_id: Option<String>,
    pub address_line: Option<String>,
    pub address_city: Option<String>,
    pub address_state: Option<String>,
    pub address_postal_code: Option<String>,
}

impl PatientIdentity {
    /// At least one canonical key must be present or the adapter should
    /// reject the input with `InvalidInput`.
    pub fn has_any_key(&self) -> bool {
        self.abha_id.is_some()
            || self.mrn.is_some()
            || (self.family_name.is_some() && self.given_name.is_some() && self.birth_date.is_some())
            || self.phone.is_some()
            || self.email.is_some()
    }

    /// `has_any_key`, plus a bare full name. Only handwritten notes have no
    /// stronger key available; every other source must clear `has_any_key`.
    pub fn has_weak_key(&self) -> bool {
        self.has_any_key() || self.full_name.is_some()
    }
}

/// The output of one adapter's `parse` call.
#[derive(Debug, Clone)]
pub struct AdapterResult {
    pub patient_identity: PatientIdentity,
    /// Pre-built Patient resource, if the adapter chooses to construct one
    /// directly rather than leaving it to the linker/bundler.
    pub fhir_patient: Option<Value>,
    /// Clinical resources in the order the adapter emitted them. References
    /// inside use adapter-local placeholder ids; the bundler rewrites them.
    pub fhir_resources: Vec<Value>,
    pub source_type: String,
    pub raw_metadata: BTreeMap<String, Value>,
}

impl AdapterResult {
    pub fn new(patient_identity: PatientIdentity, source_type: &str) -> Self {
        Self {
            patient_identity,
            fhir_patient: None,
            fhir_resources: Vec::new(),
            source_type: source_type.to_string(),
            raw_metadata: BTreeMap::new(),
        }
    }
}
