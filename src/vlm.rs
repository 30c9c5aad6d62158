use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::IngestError;

/// Vitals extracted from a handwritten note image, keyed loosely the same
/// way the realtime-vitals and EHR adapters key their readings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedVitals {
    pub heart_rate: Option<f64>,
    pub spo2: Option<f64>,
    pub bp_systolic: Option<f64>,
    pub bp_diastolic: Option<f64>,
    pub respiratory_rate: Option<f64>,
    pub temperature: Option<f64>,
}

/// The structured record a vision-language extraction produces for one
/// clinical note image.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StructuredNote {
    pub patient_name: Option<String>,
    pub chief_complaint: Option<String>,
    pub diagnoses: Vec<String>,
    pub vitals: ExtractedVitals,
}

/// Injected collaborator abstraction for turning a clinical note image into
/// structured fields. Implementations must honor the deadline — exceeding it
/// is reported as `AdapterTimeout`, not a panic or a blocked call.
pub trait VlmClient {
    fn extract(&self, image_bytes: &[u8], mime: &str, deadline: Duration) -> Result<StructuredNote, IngestError>;
}

/// Deterministic stand-in used by tests and offline runs — it does not
/// actually look at the bytes, it returns a fixed record keyed by the mime
/// type so adapter tests stay reproducible without a real model call.
pub struct MockVlmClient {
    pub fixed_response: StructuredNote,
}

impl MockVlmClient {
    pub fn new(fixed_response: StructuredNote) -> Self {
        Self { fixed_response }
    }
}

impl VlmClient for MockVlmClient {
    fn extract(&self, _image_bytes: &[u8], _mime: &str, _deadline: Duration) -> Result<StructuredNote, IngestError> {
        Ok(self.fixed_response.clone())
    }
}

/// Injected collaborator for timestamps the source data itself doesn't
/// carry (e.g. DiagnosticReport.issued when the HL7 message has no OBR-22).
pub trait Clock {
    fn now(&self) -> String;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> String {
        chrono::Utc::now().to_rfc3339()
    }
}
