//! Real-time bedside vitals adapter: JSON sample streams and ECG CSV waveforms.

use serde_json::Value;

use crate::config::PipelineConfig;
use crate::error::IngestError;
use crate::identity::{AdapterResult, PatientIdentity};
use crate::registry::{AdapterInput, SourceAdapter};
use crate::resources;

pub struct RealtimeVitalsAdapter;

const VITAL_KEYS: &[(&str, &str, &str, &str, &str)] = &[
    ("heart_rate", "8867-4", "Heart rate", "beats/min", "/min"),
    ("spo2", "59408-5", "Oxygen saturation", "%", "%"),
    ("respiratory_rate", "9279-1", "Respiratory rate", "breaths/min", "/min"),
    ("temperature", "8310-5", "Body temperature", "\u{b0}C", "Cel"),
];

fn parse_json_stream(text: &str, config: &PipelineConfig) -> Result<AdapterResult, IngestError> {
    let root: Value = serde_json::from_str(text).map_err(|e| IngestError::ParseFailed {
        source: "bedside_stream.json".to_string(),
        reason: e.to_string(),
    })?;

    let mrn = root
        .get("subject")
        .and_then(|s| s.get("mrn"))
        .and_then(|v| v.as_str())
        .ok_or_else(|| IngestError::InvalidInput {
            source: "bedside_stream.json".to_string(),
            reason: "subject.mrn is required".to_string(),
        })?
        .to_string();

    let identity = PatientIdentity {
        source_id: mrn.clone(),
        source_system: "realtime_vitals".to_string(),
        mrn: Some(mrn),
        ..Default::default()
    };

    let mut result = AdapterResult::new(identity.clone(), "realtime_vitals");
    result.fhir_patient = Some(resources::make_patient("local-patient", &identity, config));
    let subject_ref = "Patient/local-patient".to_string();

    let samples = root
        .get("samples")
        .and_then(|s| s.as_array())
        .cloned()
        .unwrap_or_default();

    let mut obs_index = 0usize;
    for sample in &samples {
        let timestamp = sample
            .get("timestamp")
            .and_then(|v| v.as_str())
            .unwrap_or("1970-01-01T00:00:00Z");

        for (key, code, display, display_unit, ucum_code) in VITAL_KEYS {
            if let Some(value) = sample.get(key).and_then(|v| v.as_f64()) {
                let local_id = format!("local-obs-{}", obs_index);
                obs_index += 1;
                result.fhir_resources.push(resources::make_observation_vital(
                    &local_id, &subject_ref, code, display, value, display_unit, ucum_code, timestamp, config,
                ));
            }
        }

        let sys = sample.get("bp_systolic").and_then(|v| v.as_f64());
        let dia = sample.get("bp_diastolic").and_then(|v| v.as_f64());
        if let (Some(sys), Some(dia)) = (sys, dia) {
            let local_id = format!("local-obs-{}", obs_index);
            obs_index += 1;
            result.fhir_resources.push(resources::make_observation_panel(
                &local_id,
                &subject_ref,
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

    Ok(result)
}

fn parse_ecg_csv(text: &str, source_file: &str, config: &PipelineConfig) -> Result<AdapterResult, IngestError> {
    let mut lines = text.lines();
    let header = lines.next().ok_or_else(|| IngestError::ParseFailed {
        source: source_file.to_string(),
        reason: "empty CSV".to_string(),
    })?;
    if header.split(',').next() != Some("timestamp_ms") {
        return Err(IngestError::InvalidInput {
            source: source_file.to_string(),
            reason: "expected timestamp_ms as first CSV column".to_string(),
        });
    }

    let mut timestamps = Vec::new();
    let mut samples = Vec::new();
    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        let mut cols = line.split(',');
        let ts: f64 = cols
            .next()
            .and_then(|s| s.trim().parse().ok())
            .ok_or_else(|| IngestError::ParseFailed {
                source: source_file.to_string(),
                reason: "bad timestamp_ms value".to_string(),
            })?;
        let mv: f64 = cols
            .next()
            .and_then(|s| s.trim().parse().ok())
            .ok_or_else(|| IngestError::ParseFailed {
                source: source_file.to_string(),
                reason: "bad mV value".to_string(),
            })?;
        timestamps.push(ts);
        samples.push(mv);
    }

    if timestamps.len() < 2 {
        return Err(IngestError::ParseFailed {
            source: source_file.to_string(),
            reason: "need at least 2 samples to compute a sampling interval".to_string(),
        });
    }

    let deltas: Vec<f64> = timestamps.windows(2).map(|w| w[1] - w[0]).collect();
    let mut sorted = deltas.clone();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let median = sorted[sorted.len() / 2];
    if median <= 0.0 {
        return Err(IngestError::ParseFailed {
            source: source_file.to_string(),
            reason: "non-increasing timestamps".to_string(),
        });
    }
    for delta in &deltas {
        if ((delta - median).abs() / median) > 0.02 {
            return Err(IngestError::InconsistentSampling {
                source: source_file.to_string(),
                reason: format!(
                    "inter-sample delta {}ms deviates >2% from median {}ms",
                    delta, median
                ),
            });
        }
    }

    // No demographic fields in a raw waveform feed; key by the source path
    // the way scans_labs does for documents with no decodable identity.
    let identity = PatientIdentity {
        source_id: source_file.to_string(),
        source_system: "realtime_vitals".to_string(),
        ..Default::default()
    };

    let mut result = AdapterResult::new(identity.clone(), "realtime_vitals");
    result.fhir_patient = Some(resources::make_patient("local-patient", &identity, config));
    let subject_ref = "Patient/local-patient".to_string();

    let start = timestamps[0];
    result.fhir_resources.push(resources::make_observation_waveform(
        "local-obs-ecg",
        &subject_ref,
        "131329-2",
        "ECG waveform",
        0.0,
        median,
        1.0,
        1,
        &samples,
        &format!("{}", start),
        config,
    ));

    Ok(result)
}

impl SourceAdapter for RealtimeVitalsAdapter {
    fn source_type(&self) -> &'static str {
        "realtime_vitals"
    }

    fn supports(&self, input: &AdapterInput) -> bool {
        match input.extension() {
            Some("json") => input
                .as_str()
                .and_then(|t| serde_json::from_str::<Value>(t).ok())
                .map(|v| v.get("samples").is_some())
                .unwrap_or(false),
            Some("csv") => input
                .as_str()
                .and_then(|t| t.lines().next().map(|l| l.split(',').next() == Some("timestamp_ms")))
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
            Some("json") => parse_json_stream(text, config),
            Some("csv") => parse_ecg_csv(text, input.file_name, config),
            _ => Err(IngestError::InvalidInput {
                source: input.file_name.to_string(),
                reason: "unrecognized realtime vitals format".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_one_observation_per_populated_vital() {
        let config = PipelineConfig::default();
        let text = r#"{
            "subject": {"mrn": "MRN-2024-001234"},
            "samples": [
                {"timestamp": "t0", "heart_rate": 80, "spo2": 97, "bp_systolic": 120, "bp_diastolic": 80},
                {"timestamp": "t1", "heart_rate": 82, "spo2": 96, "bp_systolic": 122, "bp_diastolic": 81}
            ]
        }"#;
        let input = AdapterInput {
            file_name: "sim_bedside_stream.json",
            bytes: text.as_bytes(),
        };
        let adapter = RealtimeVitalsAdapter;
        assert!(adapter.supports(&input));
        let result = adapter.parse(&input, &config).unwrap();
        // 2 samples x (heart_rate + spo2 + bp panel) = 6 Observations
        assert_eq!(result.fhir_resources.len(), 6);
    }

    #[test]
    fn jittered_waveform_is_rejected() {
        let config = PipelineConfig::default();
        let text = "timestamp_ms,mV\n0,0.1\n8,0.2\n17,0.1\n24,0.3\n32,0.2\n";
        let input = AdapterInput {
            file_name: "sim_ecg_waveform.csv",
            bytes: text.as_bytes(),
        };
        let adapter = RealtimeVitalsAdapter;
        let err = adapter.parse(&input, &config).unwrap_err();
        assert!(matches!(err, IngestError::InconsistentSampling { .. }));
    }

    #[test]
    fn uniform_waveform_produces_one_sampled_data_observation() {
        let config = PipelineConfig::default();
        let text = "timestamp_ms,mV\n0,0.1\n8,0.2\n16,0.1\n24,0.3\n32,0.2\n";
        let input = AdapterInput {
            file_name: "sim_ecg_waveform.csv",
            bytes: text.as_bytes(),
        };
        let adapter = RealtimeVitalsAdapter;
        let result = adapter.parse(&input, &config).unwrap();
        assert_eq!(result.fhir_resources.len(), 1);
        assert!(result.fhir_resources[0]["valueSampledData"].is_object());
    }
}
