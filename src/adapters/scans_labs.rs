//! Imaging and lab-document adapter: DICOM instances and PDF lab reports.

use std::io::Cursor;

use dicom_dictionary_std::tags;
use dicom_object::from_reader;

use crate::config::PipelineConfig;
use crate::error::IngestError;
use crate::identity::{AdapterResult, PatientIdentity};
use crate::registry::{AdapterInput, SourceAdapter};
use crate::resources;

pub struct ScansLabsAdapter;

const DICOM_MAGIC: &[u8] = b"DICM";

fn is_dicom(bytes: &[u8]) -> bool {
    bytes.len() > 132 && &bytes[128..132] == DICOM_MAGIC
}

fn is_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF-")
}

fn parse_dicom(input: &AdapterInput, config: &PipelineConfig) -> Result<AdapterResult, IngestError> {
    let obj = from_reader(Cursor::new(input.bytes)).map_err(|e| IngestError::ParseFailed {
        source: input.file_name.to_string(),
        reason: e.to_string(),
    })?;

    let element_str = |tag| -> Option<String> {
        obj.element(tag)
            .ok()
            .and_then(|e| e.to_str().ok())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };

    let patient_name = element_str(tags::PATIENT_NAME);
    let mrn = element_str(tags::PATIENT_ID);
    let birth_date = element_str(tags::PATIENT_BIRTH_DATE);
    let modality = element_str(tags::MODALITY).unwrap_or_else(|| "OT".to_string());
    let study_uid = element_str(tags::STUDY_INSTANCE_UID).unwrap_or_else(|| input.file_name.to_string());
    let study_date = element_str(tags::STUDY_DATE).unwrap_or_else(|| "19700101".to_string());
    let series_number = element_str(tags::SERIES_NUMBER).and_then(|s| s.parse::<u32>().ok());

    let (given_name, family_name) = match patient_name.as_deref() {
        Some(dicom_name) => {
            // DICOM PN value representation is "Family^Given"
            let mut parts = dicom_name.split('^');
            let family = parts.next().map(str::to_string);
            let given = parts.next().map(str::to_string);
            (given, family)
        }
        None => (None, None),
    };

    let identity = PatientIdentity {
        source_id: mrn.clone().unwrap_or_else(|| input.file_name.to_string()),
        source_system: "scans_labs".to_string(),
        given_name,
        family_name,
        birth_date: birth_date.and_then(|d| {
            if d.len() == 8 {
                Some(format!("{}-{}-{}", &d[0..4], &d[4..6], &d[6..8]))
            } else {
                None
            }
        }),
        mrn,
        ..Default::default()
    };

    let mut result = AdapterResult::new(identity.clone(), "scans_labs");
    result.fhir_patient = Some(resources::make_patient("local-patient", &identity, config));
    let subject_ref = "Patient/local-patient".to_string();

    let started = if study_date.len() == 8 {
        format!("{}-{}-{}", &study_date[0..4], &study_date[4..6], &study_date[6..8])
    } else {
        study_date
    };

    result.fhir_resources.push(resources::make_imaging_study(
        "local-imaging-study",
        &subject_ref,
        &modality,
        &study_uid,
        series_number,
        &started,
    ));
    result.fhir_resources.push(resources::make_document_reference(
        "local-docref",
        &subject_ref,
        "application/dicom",
        input.file_name,
        "Imaging study source instance",
        &started,
    ));

    Ok(result)
}

fn parse_pdf(input: &AdapterInput, config: &PipelineConfig) -> Result<AdapterResult, IngestError> {
    // PDFs carry no structured demographics here; identity is keyed by the
    // file's own path so a singleton cluster can still form rather than
    // being dropped for lack of a canonical key.
    let identity = PatientIdentity {
        source_id: input.file_name.to_string(),
        source_system: "scans_labs".to_string(),
        ..Default::default()
    };

    let mut result = AdapterResult::new(identity.clone(), "scans_labs");
    result.fhir_patient = Some(resources::make_patient("local-patient", &identity, config));
    let subject_ref = "Patient/local-patient".to_string();

    result.fhir_resources.push(resources::make_document_reference(
        "local-docref",
        &subject_ref,
        "application/pdf",
        input.file_name,
        "Lab report",
        "1970-01-01",
    ));

    Ok(result)
}

impl SourceAdapter for ScansLabsAdapter {
    fn source_type(&self) -> &'static str {
        "scans_labs"
    }

    fn supports(&self, input: &AdapterInput) -> bool {
        match input.extension() {
            Some("dcm") => is_dicom(input.bytes),
            Some("pdf") => is_pdf(input.bytes),
            _ => false,
        }
    }

    fn parse(&self, input: &AdapterInput, config: &PipelineConfig) -> Result<AdapterResult, IngestError> {
        match input.extension() {
            Some("dcm") => parse_dicom(input, config),
            Some("pdf") => parse_pdf(input, config),
            _ => Err(IngestError::InvalidInput {
                source: input.file_name.to_string(),
                reason: "unrecognized scans/labs format".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdf_with_no_demographics_still_produces_a_singleton_identity() {
        let config = PipelineConfig::default();
        let mut bytes = b"%PDF-1.4\n".to_vec();
        bytes.extend_from_slice(b"lab report body");
        let input = AdapterInput {
            file_name: "sim_lab_report.pdf",
            bytes: &bytes,
        };
        let adapter = ScansLabsAdapter;
        assert!(adapter.supports(&input));
        let result = adapter.parse(&input, &config).unwrap();
        assert_eq!(result.patient_identity.source_id, "sim_lab_report.pdf");
        assert_eq!(result.fhir_resources.len(), 1);
        assert_eq!(result.fhir_resources[0]["resourceType"], "DocumentReference");
    }

    #[test]
    fn non_dicom_dcm_file_is_not_claimed() {
        let input = AdapterInput {
            file_name: "not_really.dcm",
            bytes: b"not a dicom file at all, too short",
        };
        let adapter = ScansLabsAdapter;
        assert!(!adapter.supports(&input));
    }
}
