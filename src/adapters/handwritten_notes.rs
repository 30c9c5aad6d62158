//! Handwritten clinical note adapter: delegates pixel understanding to an
//! injected `VlmClient` and turns the structured result into resources.

use std::time::Duration;

use crate::config::PipelineConfig;
use crate::error::IngestError;
use crate::identity::{AdapterResult, PatientIdentity};
use crate::registry::{AdapterInput, SourceAdapter};
use crate::resources;
use crate::vlm::{ExtractedVitals, VlmClient};

pub struct HandwrittenNotesAdapter {
    vlm: Box<dyn VlmClient>,
    timeout: Duration,
}

impl HandwrittenNotesAdapter {
    pub fn new(vlm: Box<dyn VlmClient>, config: &PipelineConfig) -> Self {
        Self {
            vlm,
            timeout: Duration::from_secs(config.vlm_timeout_secs),
        }
    }
}

fn mime_for(ext: &str) -> Option<&'static str> {
    match ext {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "tif" | "tiff" => Some("image/tiff"),
        "bmp" => Some("image/bmp"),
        _ => None,
    }
}

fn push_vitals(
    vitals: &ExtractedVitals,
    subject_ref: &str,
    timestamp: &str,
    config: &PipelineConfig,
    out: &mut Vec<serde_json::Value>,
) {
    let mut idx = out.len();
    let mut push_one = |code: &str, display: &str, value: Option<f64>, display_unit: &str, ucum_code: &str| {
        if let Some(v) = value {
            let local_id = format!("local-obs-{}", idx);
            idx += 1;
            out.push(resources::make_observation_vital(
                &local_id, subject_ref, code, display, v, display_unit, ucum_code, timestamp, config,
            ));
        }
    };
    push_one("8867-4", "Heart rate", vitals.heart_rate, "beats/min", "/min");
    push_one("59408-5", "Oxygen saturation", vitals.spo2, "%", "%");
    push_one("9279-1", "Respiratory rate", vitals.respiratory_rate, "breaths/min", "/min");
    push_one("8310-5", "Body temperature", vitals.temperature, "\u{b0}C", "Cel");

    if let (Some(sys), Some(dia)) = (vitals.bp_systolic, vitals.bp_diastolic) {
        let local_id = format!("local-obs-{}", idx);
        out.push(resources::make_observation_panel(
            &local_id,
            subject_ref,
            "85354-9",
            "Blood pressure panel",
            &[
                ("8480-6", "Systolic blood pressure", sys, "mm[Hg]"),
                ("8462-2", "Diastolic blood pressure", dia, "mm[Hg]"),
            ],
            timestamp,
            config,
        ));
    }
}

impl SourceAdapter for HandwrittenNotesAdapter {
    fn source_type(&self) -> &'static str {
        "handwritten_notes"
    }

    fn supports(&self, input: &AdapterInput) -> bool {
        input
            .extension()
            .map(|ext| mime_for(ext).is_some())
            .unwrap_or(false)
    }

    fn parse(&self, input: &AdapterInput, config: &PipelineConfig) -> Result<AdapterResult, IngestError> {
        let mime = input
            .extension()
            .and_then(mime_for)
            .ok_or_else(|| IngestError::InvalidInput {
                source: input.file_name.to_string(),
                reason: "unrecognized image format".to_string(),
            })?;

        let note = self
            .vlm
            .extract(input.bytes, mime, self.timeout)
            .map_err(|_| IngestError::AdapterTimeout {
                collaborator: "vlm_client".to_string(),
                timeout_secs: self.timeout.as_secs(),
            })?;

        // No MRN or DOB ever comes out of a handwritten note; identity rests
        // entirely on the extracted name, a weak key the linker may later
        // merge onto a stronger-keyed record from another source.
        let identity = PatientIdentity {
            source_id: input.file_name.to_string(),
            source_system: "handwritten_notes".to_string(),
            full_name: note.patient_name.clone(),
            ..Default::default()
        };

        if !identity.has_weak_key() {
            return Err(IngestError::InvalidInput {
                source: input.file_name.to_string(),
                reason: "no patient name extracted from note".to_string(),
            });
        }

        let mut result = AdapterResult::new(identity.clone(), "handwritten_notes");
        result.fhir_patient = Some(resources::make_patient("local-patient", &identity, config));
        let subject_ref = "Patient/local-patient".to_string();

        let timestamp = "1970-01-01T00:00:00Z";

        result.fhir_resources.push(resources::make_document_reference(
            "local-docref",
            &subject_ref,
            mime,
            input.file_name,
            note.chief_complaint.as_deref().unwrap_or("Handwritten clinical note"),
            timestamp,
        ));

        for (i, diagnosis) in note.diagnoses.iter().enumerate() {
            let local_id = format!("local-condition-{}", i);
            result.fhir_resources.push(resources::make_condition(
                &local_id,
                &subject_ref,
                resources::ConditionCodeSystem::FreeText,
                None,
                diagnosis,
                "active",
                Some(timestamp),
                config,
            ));
        }

        push_vitals(&note.vitals, &subject_ref, timestamp, config, &mut result.fhir_resources);

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vlm::{MockVlmClient, StructuredNote};

    #[test]
    fn extracts_docref_conditions_and_vitals_from_mocked_note() {
        let config = PipelineConfig::default();
        let note = StructuredNote {
            patient_name: Some("Anita Sharma".to_string()),
            chief_complaint: Some("fever and cough".to_string()),
            diagnoses: vec!["Acute bronchitis".to_string()],
            vitals: ExtractedVitals {
                heart_rate: Some(96.0),
                spo2: Some(95.0),
                bp_systolic: Some(118.0),
                bp_diastolic: Some(76.0),
                ..Default::default()
            },
        };
        let vlm = Box::new(MockVlmClient::new(note));
        let adapter = HandwrittenNotesAdapter::new(vlm, &config);

        let input = AdapterInput {
            file_name: "sim_handwritten_note.jpg",
            bytes: b"pretend-jpeg-bytes",
        };
        assert!(adapter.supports(&input));
        let result = adapter.parse(&input, &config).unwrap();
        assert_eq!(result.patient_identity.full_name.as_deref(), Some("Anita Sharma"));

        let types: Vec<_> = result
            .fhir_resources
            .iter()
            .map(|r| r["resourceType"].as_str().unwrap().to_string())
            .collect();
        assert!(types.contains(&"DocumentReference".to_string()));
        assert!(types.contains(&"Condition".to_string()));
        // heart_rate + spo2 + bp panel = 3 Observations
        assert_eq!(types.iter().filter(|t| *t == "Observation").count(), 3);
    }

    #[test]
    fn non_image_file_is_not_claimed() {
        let config = PipelineConfig::default();
        let note = StructuredNote::default();
        let vlm = Box::new(MockVlmClient::new(note));
        let adapter = HandwrittenNotesAdapter::new(vlm, &config);
        let input = AdapterInput {
            file_name: "notes.txt",
            bytes: b"plain text",
        };
        assert!(!adapter.supports(&input));
    }
}
