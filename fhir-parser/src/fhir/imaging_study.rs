use serde::{Deserialize, Serialize};

use super::observation::{Coding, Reference};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagingStudySeries {
    pub uid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<u32>,
    pub modality: Coding,
}

/// FHIR R4 ImagingStudy — a set of DICOM series/instances for one study.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagingStudy {
    #[serde(rename = "resourceType")]
    pub resource_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// registered | available | cancelled | entered-in-error | unknown
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<Reference>,
    pub started: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_series: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series: Option<Vec<ImagingStudySeries>>,
}
