//! Resource Builders (C1): construct conformant clinical resources from
//! scalar field values. Adapters call these instead of hand-assembling
//! `serde_json::Value` so every resource in the pipeline shares one set of
//! coding-system and shape conventions.

use fhir_parser::fhir::condition::{Annotation, Condition};
use fhir_parser::fhir::diagnostic_report::DiagnosticReport;
use fhir_parser::fhir::document_reference::{
    DocumentReference, DocumentReferenceAttachment, DocumentReferenceContent,
};
use fhir_parser::fhir::encounter::{Coding as EncCoding, Encounter, Period, Reference as EncReference};
use fhir_parser::fhir::imaging_study::{ImagingStudy, ImagingStudySeries};
use fhir_parser::fhir::observation::{
    CodeableConcept, Coding, Observation, ObservationComponent, Quantity, Reference, SampledData,
};
use fhir_parser::fhir::patient::{Address, ContactPoint, HumanName, Identifier, Patient};
use serde_json::Value;

use crate::config::PipelineConfig;
use crate::identity::PatientIdentity;

fn to_value<T: serde::Serialize>(resource: &T) -> Value {
    serde_json::to_value(resource).expect("resource always serializes")
}

/// Best-effort human-readable rendering of a UCUM unit code, for sources
/// (HL7 OBX-6, NEMSIS eVitals) that only carry the coded form on the wire.
pub fn humanize_ucum_unit(ucum_code: &str) -> String {
    match ucum_code {
        "/min" => "per minute",
        "mm[Hg]" => "mmHg",
        "Cel" => "\u{b0}C",
        "%" => "%",
        "kg" => "kg",
        "cm" => "cm",
        "mV" => "mV",
        other => other,
    }
    .to_string()
}

pub fn vital_signs_category() -> CodeableConcept {
    CodeableConcept {
        coding: Some(vec![Coding {
            system: Some("http://terminology.hl7.org/CodeSystem/observation-category".to_string()),
            code: Some("vital-signs".to_string()),
            display: Some("Vital Signs".to_string()),
        }]),
        text: Some("Vital Signs".to_string()),
    }
}

pub fn make_patient(local_id: &str, identity: &PatientIdentity, config: &PipelineConfig) -> Value {
    let mut identifiers = Vec::new();
    if let Some(ref mrn) = identity.mrn {
        identifiers.push(Identifier {
            system: Some(config.mrn_system.clone()),
            value: mrn.clone(),
        });
    }
    if let Some(ref abha) = identity.abha_id {
        identifiers.push(Identifier {
            system: Some(config.abha_system.clone()),
            value: abha.clone(),
        });
    }

    let name = if identity.family_name.is_some() || identity.given_name.is_some() {
        Some(vec![HumanName {
            use_field: Some("official".to_string()),
            family: identity.family_name.clone(),
            given: identity.given_name.clone().map(|g| vec![g]),
        }])
    } else if let Some(ref full) = identity.full_name {
        let mut parts = full.split_whitespace();
        let given = parts.next().map(|s| vec![s.to_string()]);
        let family = parts.last().map(|s| s.to_string());
        Some(vec![HumanName {
            use_field: Some("official".to_string()),
            family,
            given,
        }])
    } else {
        None
    };

    let telecom = {
        let mut points = Vec::new();
        if let Some(ref phone) = identity.phone {
            points.push(ContactPoint {
                system: Some("phone".to_string()),
                value: phone.clone(),
                use_field: None,
            });
        }
        if let Some(ref email) = identity.email {
            points.push(ContactPoint {
                system: Some("email".to_string()),
                value: email.clone(),
                use_field: None,
            });
        }
        if points.is_empty() {
            None
        } else {
            Some(points)
        }
    };

    let gender = identity.gender.clone().or(Some("unknown".to_string()));

    let address = if identity.address_line.is_some() || identity.address_city.is_some() {
        Some(vec![Address {
            line: identity.address_line.clone().map(|l| vec![l]),
            city: identity.address_city.clone(),
            district: None,
            state: identity.address_state.clone(),
            country: None,
        }])
    } else {
        None
    };

    let patient = Patient {
        resource_type: "Patient".to_string(),
        id: Some(local_id.to_string()),
        identifier: if identifiers.is_empty() { None } else { Some(identifiers) },
        name,
        telecom,
        gender,
        birth_date: identity
            .birth_date
            .as_deref()
            .and_then(|d| chrono::NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()),
        address,
    };
    to_value(&patient)
}

#[allow(clippy::too_many_arguments)]
pub fn make_observation_vital(
    local_id: &str,
    subject_ref: &str,
    loinc_code: &str,
    display: &str,
    numeric_value: f64,
    display_unit: &str,
    ucum_code: &str,
    iso_instant: &str,
    config: &PipelineConfig,
) -> Value {
    let obs = Observation {
        resource_type: "Observation".to_string(),
        id: Some(local_id.to_string()),
        status: "final".to_string(),
        category: Some(vec![vital_signs_category()]),
        code: CodeableConcept {
            coding: Some(vec![Coding {
                system: Some(config.loinc_system.clone()),
                code: Some(loinc_code.to_string()),
                display: Some(display.to_string()),
            }]),
            text: Some(display.to_string()),
        },
        subject: Some(Reference {
            reference: Some(subject_ref.to_string()),
            display: None,
        }),
        effective_date_time: Some(iso_instant.to_string()),
        value_quantity: Some(Quantity {
            value: numeric_value,
            unit: Some(display_unit.to_string()),
            system: Some(config.ucum_system.clone()),
            code: Some(ucum_code.to_string()),
        }),
        value_sampled_data: None,
        component: None,
    };
    to_value(&obs)
}

/// Blood-pressure style panel: one Observation with systolic/diastolic
/// components, both LOINC-coded.
pub fn make_observation_panel(
    local_id: &str,
    subject_ref: &str,
    panel_loinc: &str,
    panel_display: &str,
    components: &[(&str, &str, f64, &str)],
    iso_instant: &str,
    config: &PipelineConfig,
) -> Value {
    let component = components
        .iter()
        .map(|(code, display, value, unit)| ObservationComponent {
            code: CodeableConcept {
                coding: Some(vec![Coding {
                    system: Some(config.loinc_system.clone()),
                    code: Some(code.to_string()),
                    display: Some(display.to_string()),
                }]),
                text: Some(display.to_string()),
            },
            value_quantity: Some(Quantity {
                value: *value,
                unit: Some(humanize_ucum_unit(unit)),
                system: Some(config.ucum_system.clone()),
                code: Some(unit.to_string()),
            }),
        })
        .collect();

    let obs = Observation {
        resource_type: "Observation".to_string(),
        id: Some(local_id.to_string()),
        status: "final".to_string(),
        category: Some(vec![vital_signs_category()]),
        code: CodeableConcept {
            coding: Some(vec![Coding {
                system: Some(config.loinc_system.clone()),
                code: Some(panel_loinc.to_string()),
                display: Some(panel_display.to_string()),
            }]),
            text: Some(panel_display.to_string()),
        },
        subject: Some(Reference {
            reference: Some(subject_ref.to_string()),
            display: None,
        }),
        effective_date_time: Some(iso_instant.to_string()),
        value_quantity: None,
        value_sampled_data: None,
        component: Some(component),
    };
    to_value(&obs)
}

#[allow(clippy::too_many_arguments)]
pub fn make_observation_waveform(
    local_id: &str,
    subject_ref: &str,
    loinc_code: &str,
    display: &str,
    origin: f64,
    period_ms: f64,
    factor: f64,
    dimensions: u32,
    samples: &[f64],
    iso_instant: &str,
    config: &PipelineConfig,
) -> Value {
    let data = samples
        .iter()
        .map(|v| format!("{}", v))
        .collect::<Vec<_>>()
        .join(" ");

    let obs = Observation {
        resource_type: "Observation".to_string(),
        id: Some(local_id.to_string()),
        status: "final".to_string(),
        category: Some(vec![vital_signs_category()]),
        code: CodeableConcept {
            coding: Some(vec![Coding {
                system: Some(config.loinc_system.clone()),
                code: Some(loinc_code.to_string()),
                display: Some(display.to_string()),
            }]),
            text: Some(display.to_string()),
        },
        subject: Some(Reference {
            reference: Some(subject_ref.to_string()),
            display: None,
        }),
        effective_date_time: Some(iso_instant.to_string()),
        value_quantity: None,
        value_sampled_data: Some(SampledData {
            origin: Quantity {
                value: origin,
                unit: Some("mV".to_string()),
                system: Some(config.ucum_system.clone()),
                code: Some("mV".to_string()),
            },
            period: period_ms,
            factor: Some(factor),
            dimensions,
            data,
        }),
        component: None,
    };
    to_value(&obs)
}

pub enum ConditionCodeSystem {
    Icd10,
    Snomed,
    FreeText,
}

pub fn make_condition(
    local_id: &str,
    subject_ref: &str,
    system: ConditionCodeSystem,
    code: Option<&str>,
    display: &str,
    clinical_status: &str,
    onset: Option<&str>,
    config: &PipelineConfig,
) -> Value {
    let code_concept = match (system, code) {
        (ConditionCodeSystem::Icd10, Some(code)) => Some(CodeableConcept {
            coding: Some(vec![Coding {
                system: Some(config.icd10_system.clone()),
                code: Some(code.to_string()),
                display: Some(display.to_string()),
            }]),
            text: Some(display.to_string()),
        }),
        (ConditionCodeSystem::Snomed, Some(code)) => Some(CodeableConcept {
            coding: Some(vec![Coding {
                system: Some(config.snomed_system.clone()),
                code: Some(code.to_string()),
                display: Some(display.to_string()),
            }]),
            text: Some(display.to_string()),
        }),
        _ => Some(CodeableConcept {
            coding: None,
            text: Some(display.to_string()),
        }),
    };

    let condition = Condition {
        resource_type: "Condition".to_string(),
        id: Some(local_id.to_string()),
        clinical_status: Some(CodeableConcept {
            coding: None,
            text: Some(clinical_status.to_string()),
        }),
        verification_status: None,
        code: code_concept,
        subject: Some(fhir_parser::fhir::observation::Reference {
            reference: Some(subject_ref.to_string()),
            display: None,
        }),
        encounter: None,
        onset_date_time: onset.map(|s| s.to_string()),
        note: None,
    };
    to_value(&condition)
}

pub fn make_condition_with_note(mut condition: Value, note_text: &str) -> Value {
    condition["note"] = to_value(&vec![Annotation {
        text: note_text.to_string(),
    }]);
    condition
}

pub fn make_encounter(
    local_id: &str,
    subject_ref: &str,
    class: &str,
    period_start: &str,
    period_end: Option<&str>,
    status: &str,
) -> Value {
    let (class_code, class_display) = match class {
        "inpatient" => ("IMP", "inpatient encounter"),
        "emergency" => ("EMER", "emergency"),
        _ => ("AMB", "ambulatory"),
    };

    let encounter = Encounter {
        resource_type: "Encounter".to_string(),
        id: Some(local_id.to_string()),
        status: status.to_string(),
        class: EncCoding {
            system: Some("http://terminology.hl7.org/CodeSystem/v3-ActCode".to_string()),
            code: Some(class_code.to_string()),
            display: Some(class_display.to_string()),
        },
        r#type: None,
        subject: EncReference {
            reference: subject_ref.to_string(),
            display: None,
        },
        participant: None,
        period: Some(Period {
            start: Some(period_start.to_string()),
            end: period_end.map(|s| s.to_string()),
        }),
        service_provider: None,
        reason_code: None,
    };
    to_value(&encounter)
}

pub fn make_diagnostic_report(
    local_id: &str,
    subject_ref: &str,
    code: &str,
    display: &str,
    result_refs: &[String],
    issued: &str,
) -> Value {
    let report = DiagnosticReport {
        resource_type: "DiagnosticReport".to_string(),
        id: Some(local_id.to_string()),
        status: "final".to_string(),
        category: None,
        code: CodeableConcept {
            coding: Some(vec![Coding {
                system: Some("http://loinc.org".to_string()),
                code: Some(code.to_string()),
                display: Some(display.to_string()),
            }]),
            text: Some(display.to_string()),
        },
        subject: Some(Reference {
            reference: Some(subject_ref.to_string()),
            display: None,
        }),
        encounter: None,
        issued: issued.to_string(),
        result: if result_refs.is_empty() {
            None
        } else {
            Some(
                result_refs
                    .iter()
                    .map(|r| Reference {
                        reference: Some(r.clone()),
                        display: None,
                    })
                    .collect(),
            )
        },
    };
    to_value(&report)
}

pub fn make_imaging_study(
    local_id: &str,
    subject_ref: &str,
    modality: &str,
    study_instance_uid: &str,
    series_number: Option<u32>,
    started: &str,
) -> Value {
    let study = ImagingStudy {
        resource_type: "ImagingStudy".to_string(),
        id: Some(local_id.to_string()),
        status: "available".to_string(),
        subject: Some(Reference {
            reference: Some(subject_ref.to_string()),
            display: None,
        }),
        started: started.to_string(),
        number_of_series: series_number,
        series: Some(vec![ImagingStudySeries {
            uid: study_instance_uid.to_string(),
            number: series_number,
            modality: Coding {
                system: Some("http://dicom.nema.org/resources/ontology/DCM".to_string()),
                code: Some(modality.to_string()),
                display: Some(modality.to_string()),
            },
        }]),
    };
    to_value(&study)
}

pub fn make_document_reference(
    local_id: &str,
    subject_ref: &str,
    mime_type: &str,
    source_path: &str,
    description: &str,
    date: &str,
) -> Value {
    let doc = DocumentReference {
        resource_type: "DocumentReference".to_string(),
        id: Some(local_id.to_string()),
        status: "current".to_string(),
        doc_type: Some(CodeableConcept {
            coding: None,
            text: Some(description.to_string()),
        }),
        subject: Some(Reference {
            reference: Some(subject_ref.to_string()),
            display: None,
        }),
        date: date.to_string(),
        content: vec![DocumentReferenceContent {
            attachment: DocumentReferenceAttachment {
                content_type: mime_type.to_string(),
                url: Some(source_path.to_string()),
                title: Some(description.to_string()),
            },
        }],
    };
    to_value(&doc)
}
