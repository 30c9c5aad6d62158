use serde::{Deserialize, Serialize};

use super::observation::{CodeableConcept, Reference};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentReferenceContent {
    pub attachment: DocumentReferenceAttachment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentReferenceAttachment {
    #[serde(rename = "contentType")]
    pub content_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// FHIR R4 DocumentReference — a pointer to a source document (scanned note,
/// PDF lab report, DICOM instance) that was not itself decomposed into
/// structured resources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentReference {
    #[serde(rename = "resourceType")]
    pub resource_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// current | superseded | entered-in-error
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "type")]
    pub doc_type: Option<CodeableConcept>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<Reference>,
    pub date: String,
    pub content: Vec<DocumentReferenceContent>,
}
