use serde::{Deserialize, Serialize};

use super::observation::{CodeableConcept, Reference};

/// FHIR R4 DiagnosticReport — the findings/interpretation of a lab panel or
/// imaging study, referencing the constituent Observations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticReport {
    #[serde(rename = "resourceType")]
    pub resource_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// registered | partial | preliminary | final | amended | cancelled
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Vec<CodeableConcept>>,
    pub code: CodeableConcept,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encounter: Option<Reference>,
    pub issued: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Vec<Reference>>,
}
