//! NEMSIS-style ambulance/EMS run report adapter.

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::config::PipelineConfig;
use crate::error::IngestError;
use crate::identity::{AdapterResult, PatientIdentity};
use crate::registry::{AdapterInput, SourceAdapter};
use crate::resources;

pub struct AmbulanceEmsAdapter;

#[derive(Default)]
struct VitalGroup {
    timestamp: Option<String>,
    heart_rate: Option<f64>,
    bp_systolic: Option<f64>,
    bp_diastolic: Option<f64>,
    spo2: Option<f64>,
    respiratory_rate: Option<f64>,
    temperature: Option<f64>,
}

impl SourceAdapter for AmbulanceEmsAdapter {
    fn source_type(&self) -> &'static str {
        "ambulance_ems"
    }

    fn supports(&self, input: &AdapterInput) -> bool {
        if input.extension() != Some("xml") {
            return false;
        }
        input
            .as_str()
            .map(|t| t.contains("nemsis.org"))
            .unwrap_or(false)
    }

    fn parse(&self, input: &AdapterInput, config: &PipelineConfig) -> Result<AdapterResult, IngestError> {
        let text = input.as_str().ok_or_else(|| IngestError::InvalidInput {
            source: input.file_name.to_string(),
            reason: "not valid UTF-8".to_string(),
        })?;

        let mut reader = Reader::from_str(text);
        reader.trim_text(true);

        let mut identity = PatientIdentity {
            source_system: "ambulance_ems".to_string(),
            ..Default::default()
        };

        let mut dispatch_time = None;
        let mut arrival_time = None;
        let mut groups: Vec<VitalGroup> = Vec::new();
        let mut current_group: Option<VitalGroup> = None;

        let mut buf = Vec::new();
        let mut path: Vec<String> = Vec::new();
        let mut text_buf = String::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    let local = local_name(&e);
                    if local == "eVitals.VitalGroup" {
                        current_group = Some(VitalGroup::default());
                    }
                    path.push(local);
                    text_buf.clear();
                }
                Ok(Event::Text(e)) => {
                    text_buf.push_str(&e.unescape().unwrap_or_default());
                }
                Ok(Event::End(e)) => {
                    let local = local_name(&e);
                    let value = text_buf.trim().to_string();
                    match local.as_str() {
                        "ePatient.01" => identity.family_name = Some(value.clone()),
                        "ePatient.02" => identity.given_name = Some(value.clone()),
                        "ePatient.13" => {
                            identity.gender = Some(match value.as_str() {
                                "9906001" => "male".to_string(),
                                "9906003" => "female".to_string(),
                                _ => "unknown".to_string(),
                            })
                        }
                        "ePatient.15" => identity.abha_id = Some(value.clone()),
                        "ePatient.17" => identity.birth_date = Some(value.clone()),
                        "ePatient.MRN" => identity.mrn = Some(value.clone()),
                        "eTimes.01" => dispatch_time = Some(value.clone()),
                        "eTimes.07" => arrival_time = Some(value.clone()),
                        "eVitals.01" => {
                            if let Some(g) = current_group.as_mut() {
                                g.timestamp = Some(value.clone());
                            }
                        }
                        "eVitals.06" => {
                            if let Some(g) = current_group.as_mut() {
                                g.bp_systolic = value.parse().ok();
                            }
                        }
                        "eVitals.07" => {
                            if let Some(g) = current_group.as_mut() {
                                g.bp_diastolic = value.parse().ok();
                            }
                        }
                        "eVitals.10" => {
                            if let Some(g) = current_group.as_mut() {
                                g.heart_rate = value.parse().ok();
                            }
                        }
                        "eVitals.12" => {
                            if let Some(g) = current_group.as_mut() {
                                g.spo2 = value.parse().ok();
                            }
                        }
                        "eVitals.14" => {
                            if let Some(g) = current_group.as_mut() {
                                g.respiratory_rate = value.parse().ok();
                            }
                        }
                        "eVitals.24" => {
                            if let Some(g) = current_group.as_mut() {
                                g.temperature = value.parse().ok();
                            }
                        }
                        "eVitals.VitalGroup" => {
                            if let Some(g) = current_group.take() {
                                groups.push(g);
                            }
                        }
                        _ => {}
                    }
                    path.pop();
                    text_buf.clear();
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(IngestError::ParseFailed {
                        source: input.file_name.to_string(),
                        reason: e.to_string(),
                    })
                }
                _ => {}
            }
            buf.clear();
        }

        if !identity.has_any_key() {
            return Err(IngestError::InvalidInput {
                source: input.file_name.to_string(),
                reason: "ePatient group carries no usable identity key".to_string(),
            });
        }

        let mut result = AdapterResult::new(identity.clone(), "ambulance_ems");
        result.fhir_patient = Some(resources::make_patient("local-patient", &identity, config));
        let subject_ref = "Patient/local-patient".to_string();

        let dispatch_time = dispatch_time.unwrap_or_else(|| "1970-01-01T00:00:00Z".to_string());
        result.fhir_resources.push(resources::make_encounter(
            "local-encounter",
            &subject_ref,
            "emergency",
            &dispatch_time,
            arrival_time.as_deref(),
            "finished",
        ));

        let mut obs_index = 0usize;
        for group in &groups {
            let ts = group.timestamp.clone().unwrap_or_else(|| dispatch_time.clone());
            let mut push = |code: &str, display: &str, value: Option<f64>, display_unit: &str, ucum_code: &str, idx: &mut usize| {
                if let Some(v) = value {
                    let local_id = format!("local-obs-{}", *idx);
                    *idx += 1;
                    result.fhir_resources.push(resources::make_observation_vital(
                        &local_id, &subject_ref, code, display, v, display_unit, ucum_code, &ts, config,
                    ));
                }
            };
            push("8867-4", "Heart rate", group.heart_rate, "beats/min", "/min", &mut obs_index);
            push("59408-5", "Oxygen saturation", group.spo2, "%", "%", &mut obs_index);
            push("9279-1", "Respiratory rate", group.respiratory_rate, "breaths/min", "/min", &mut obs_index);
            push("8310-5", "Body temperature", group.temperature, "\u{b0}C", "Cel", &mut obs_index);
            if let (Some(sys), Some(dia)) = (group.bp_systolic, group.bp_diastolic) {
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
                    &ts,
                    config,
                ));
            }
        }

        Ok(result)
    }
}

fn local_name(e: &quick_xml::events::BytesStart) -> String {
    let full = String::from_utf8_lossy(e.name().as_ref()).to_string();
    full.rsplit(':').next().unwrap_or(&full).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<EMSDataSet xmlns="http://www.nemsis.org/media/nemsis_v3/release-3.5.0/XSDs/NEMSIS_NAT_XSD/">
        <PatientCareReport>
            <ePatient>
                <ePatient.PatientNameGroup>
                    <ePatient.01>Kumar</ePatient.01>
                    <ePatient.02>Rajesh</ePatient.02>
                </ePatient.PatientNameGroup>
                <ePatient.13>9906001</ePatient.13>
                <ePatient.MRN>MRN-2024-001234</ePatient.MRN>
            </ePatient>
            <eTimes>
                <eTimes.01>2026-01-01T07:50:00Z</eTimes.01>
                <eTimes.07>2026-01-01T08:05:00Z</eTimes.07>
            </eTimes>
            <eVitals>
                <eVitals.VitalGroup>
                    <eVitals.01>2026-01-01T07:55:00Z</eVitals.01>
                    <eVitals.06>130</eVitals.06>
                    <eVitals.07>85</eVitals.07>
                    <eVitals.10>92</eVitals.10>
                    <eVitals.12>96</eVitals.12>
                </eVitals.VitalGroup>
            </eVitals>
        </PatientCareReport>
    </EMSDataSet>"#;

    #[test]
    fn parses_identity_encounter_and_vitals() {
        let config = PipelineConfig::default();
        let input = AdapterInput {
            file_name: "sim_ems_run.xml",
            bytes: SAMPLE.as_bytes(),
        };
        let adapter = AmbulanceEmsAdapter;
        assert!(adapter.supports(&input));
        let result = adapter.parse(&input, &config).unwrap();
        assert_eq!(result.patient_identity.family_name.as_deref(), Some("Kumar"));
        assert_eq!(result.patient_identity.given_name.as_deref(), Some("Rajesh"));
        assert_eq!(result.patient_identity.mrn.as_deref(), Some("MRN-2024-001234"));

        let types: Vec<_> = result
            .fhir_resources
            .iter()
            .map(|r| r["resourceType"].as_str().unwrap().to_string())
            .collect();
        assert!(types.contains(&"Encounter".to_string()));
        assert!(types.iter().filter(|t| *t == "Observation").count() >= 3);
    }
}
