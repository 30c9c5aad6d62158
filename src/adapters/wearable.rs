//! Wearable telemetry adapter: Apple Health XML export and Google Fit JSON export.

use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::Value;

use crate::config::PipelineConfig;
use crate::error::IngestError;
use crate::identity::{AdapterResult, PatientIdentity};
use crate::registry::{AdapterInput, SourceAdapter};
use crate::resources;

pub struct WearableAdapter;

/// Apple `HKQuantityTypeIdentifier*` → (LOINC code, display, display unit, UCUM code).
fn apple_loinc(hk_type: &str) -> Option<(&'static str, &'static str, &'static str, &'static str)> {
    match hk_type {
        "HKQuantityTypeIdentifierHeartRate" => Some(("8867-4", "Heart rate", "beats/min", "/min")),
        "HKQuantityTypeIdentifierOxygenSaturation" => Some(("59408-5", "Oxygen saturation", "%", "%")),
        "HKQuantityTypeIdentifierRespiratoryRate" => Some(("9279-1", "Respiratory rate", "breaths/min", "/min")),
        "HKQuantityTypeIdentifierBodyTemperature" => Some(("8310-5", "Body temperature", "\u{b0}C", "Cel")),
        "HKQuantityTypeIdentifierBodyMass" => Some(("29463-7", "Body weight", "kg", "kg")),
        "HKQuantityTypeIdentifierHeight" => Some(("8302-2", "Body height", "cm", "cm")),
        _ => None,
    }
}

/// Google Fit `dataTypeName` → (LOINC code, display, display unit, UCUM code).
fn google_fit_loinc(data_type: &str) -> Option<(&'static str, &'static str, &'static str, &'static str)> {
    match data_type {
        "com.google.heart_rate.bpm" => Some(("8867-4", "Heart rate", "beats/min", "/min")),
        "com.google.oxygen_saturation" => Some(("59408-5", "Oxygen saturation", "%", "%")),
        "com.google.weight" => Some(("29463-7", "Body weight", "kg", "kg")),
        "com.google.height" => Some(("8302-2", "Body height", "cm", "cm")),
        _ => None,
    }
}

fn parse_apple_health(text: &str, config: &PipelineConfig) -> Result<AdapterResult, IngestError> {
    let mut reader = Reader::from_str(text);
    reader.trim_text(true);

    let mut identity = PatientIdentity {
        source_system: "wearable".to_string(),
        ..Default::default()
    };
    let mut observations = Vec::new();
    let mut buf = Vec::new();
    let mut obs_index = 0usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(e)) | Ok(Event::Start(e)) => {
                let name = e.name();
                let local = String::from_utf8_lossy(name.as_ref()).to_string();
                let mut attrs = std::collections::HashMap::new();
                for attr in e.attributes().flatten() {
                    let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
                    let value = attr.unescape_value().unwrap_or_default().to_string();
                    attrs.insert(key, value);
                }

                match local.as_str() {
                    "HealthData" => {
                        identity.mrn = attrs.get("patientMrn").cloned();
                        identity.full_name = attrs.get("patientName").cloned();
                    }
                    "Me" => {
                        if let Some(dob) = attrs.get("HKCharacteristicTypeIdentifierDateOfBirth") {
                            identity.birth_date = Some(dob.clone());
                        }
                        if let Some(sex) = attrs.get("HKCharacteristicTypeIdentifierBiologicalSex") {
                            identity.gender = Some(match sex.as_str() {
                                "HKBiologicalSexMale" => "male".to_string(),
                                "HKBiologicalSexFemale" => "female".to_string(),
                                _ => "unknown".to_string(),
                            });
                        }
                    }
                    "Record" => {
                        let hk_type = attrs.get("type").cloned().unwrap_or_default();
                        if let Some((code, display, display_unit, ucum_code)) = apple_loinc(&hk_type) {
                            let value = attrs
                                .get("value")
                                .and_then(|v| v.parse::<f64>().ok())
                                .unwrap_or(0.0);
                            let start_date = attrs.get("startDate").cloned().unwrap_or_default();
                            let local_id = format!("local-obs-{}", obs_index);
                            obs_index += 1;
                            observations.push((local_id, code, display, value, display_unit, ucum_code, start_date));
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(IngestError::ParseFailed {
                    source: "apple_health.xml".to_string(),
                    reason: e.to_string(),
                })
            }
            _ => {}
        }
        buf.clear();
    }

    if !identity.has_any_key() {
        return Err(IngestError::InvalidInput {
            source: "apple_health.xml".to_string(),
            reason: "no mrn/name/dob found in HealthData export".to_string(),
        });
    }

    let mut result = AdapterResult::new(identity.clone(), "wearable");
    result.fhir_patient = Some(resources::make_patient("local-patient", &identity, config));
    let subject_ref = "Patient/local-patient".to_string();
    for (local_id, code, display, value, display_unit, ucum_code, start_date) in observations {
        result.fhir_resources.push(resources::make_observation_vital(
            &local_id, &subject_ref, code, display, value, display_unit, ucum_code, &start_date, config,
        ));
    }
    Ok(result)
}

fn parse_google_fit(text: &str, config: &PipelineConfig) -> Result<AdapterResult, IngestError> {
    let root: Value = serde_json::from_str(text).map_err(|e| IngestError::ParseFailed {
        source: "google_fit.json".to_string(),
        reason: e.to_string(),
    })?;

    let patient = root.get("patient");
    let identity = PatientIdentity {
        source_system: "wearable".to_string(),
        full_name: patient.and_then(|p| p["full_name"].as_str()).map(str::to_string),
        mrn: patient.and_then(|p| p["mrn"].as_str()).map(str::to_string),
        gender: patient.and_then(|p| p["gender"].as_str()).map(str::to_string),
        ..Default::default()
    };

    if !identity.has_any_key() {
        return Err(IngestError::InvalidInput {
            source: "google_fit.json".to_string(),
            reason: "no patient identity found".to_string(),
        });
    }

    let mut result = AdapterResult::new(identity.clone(), "wearable");
    result.fhir_patient = Some(resources::make_patient("local-patient", &identity, config));
    let subject_ref = "Patient/local-patient".to_string();

    let mut obs_index = 0usize;
    if let Some(buckets) = root.get("bucket").and_then(|b| b.as_array()) {
        for bucket in buckets {
            let Some(datasets) = bucket.get("dataset").and_then(|d| d.as_array()) else {
                continue;
            };
            for dataset in datasets {
                let data_type = dataset
                    .get("dataSourceId")
                    .and_then(|v| v.as_str())
                    .unwrap_or("");
                let Some((code, display, display_unit, ucum_code)) = google_fit_loinc(data_type) else {
                    continue;
                };
                let Some(points) = dataset.get("point").and_then(|p| p.as_array()) else {
                    continue;
                };
                for point in points {
                    let value = point
                        .get("value")
                        .and_then(|v| v.as_array())
                        .and_then(|arr| arr.first())
                        .and_then(|v| v.get("fpVal").or_else(|| v.get("intVal")))
                        .and_then(|v| v.as_f64())
                        .unwrap_or(0.0);
                    let timestamp = point
                        .get("startTimeNanos")
                        .and_then(|v| v.as_str())
                        .unwrap_or("0")
                        .to_string();
                    let local_id = format!("local-obs-{}", obs_index);
                    obs_index += 1;
                    result.fhir_resources.push(resources::make_observation_vital(
                        &local_id, &subject_ref, code, display, value, display_unit, ucum_code, &timestamp, config,
                    ));
                }
            }
        }
    }

    Ok(result)
}

impl SourceAdapter for WearableAdapter {
    fn source_type(&self) -> &'static str {
        "wearable"
    }

    fn supports(&self, input: &AdapterInput) -> bool {
        match input.extension() {
            Some("xml") => input
                .as_str()
                .map(|t| t.contains("<HealthData"))
                .unwrap_or(false),
            Some("json") => input
                .as_str()
                .and_then(|t| serde_json::from_str::<Value>(t).ok())
                .map(|v| v.get("bucket").is_some() && v.get("dataSourceId").is_some())
                .unwrap_or(false),
            _ => false,
        }
    }

    fn parse(&self, input: &AdapterInput, config: &PipelineConfig) -> Result<AdapterResult, IngestError> {
        let text = input.as_str().ok_or_else(|| IngestError::InvalidInput {
            source: input.file_name.to_string(),
            reason: "not valid UTF-8".to_string(),
        })?;

        match input.extension() {
            Some("xml") => parse_apple_health(text, config),
            Some("json") => parse_google_fit(text, config),
            _ => Err(IngestError::InvalidInput {
                source: input.file_name.to_string(),
                reason: "unrecognized wearable format".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const APPLE_SAMPLE: &str = r#"<HealthData patientMrn="MRN-2024-001234" patientName="Rajesh Kumar">
        <Me HKCharacteristicTypeIdentifierDateOfBirth="1975-08-15" HKCharacteristicTypeIdentifierBiologicalSex="HKBiologicalSexMale"/>
        <Record type="HKQuantityTypeIdentifierHeartRate" value="72" startDate="2026-01-01T08:00:00Z"/>
        <Record type="HKQuantityTypeIdentifierOxygenSaturation" value="98" startDate="2026-01-01T08:01:00Z"/>
    </HealthData>"#;

    #[test]
    fn parses_apple_health_identity_and_observations() {
        let config = PipelineConfig::default();
        let input = AdapterInput {
            file_name: "sim_apple_health.xml",
            bytes: APPLE_SAMPLE.as_bytes(),
        };
        let adapter = WearableAdapter;
        assert!(adapter.supports(&input));
        let result = adapter.parse(&input, &config).unwrap();
        assert_eq!(result.patient_identity.full_name.as_deref(), Some("Rajesh Kumar"));
        assert_eq!(result.patient_identity.birth_date.as_deref(), Some("1975-08-15"));
        assert_eq!(result.patient_identity.gender.as_deref(), Some("male"));
        assert_eq!(result.fhir_resources.len(), 2);
        for r in &result.fhir_resources {
            assert_eq!(r["resourceType"], "Observation");
        }
    }
}
