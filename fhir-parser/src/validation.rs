use crate::fhir::bundle::Bundle;
use crate::fhir::observation::Observation;
use crate::fhir::patient::Patient;

pub fn validate_patient(patient: &Patient) -> Vec<String> {
    let mut errors = Vec::new();

    if patient.resource_type != "Patient" {
        errors.push("resourceType must be \"Patient\"".into());
    }

    if patient.identifier.is_none() && patient.name.is_none() {
        errors.push("Warning: Patient should have at least an identifier or name".into());
    }

    if let Some(ref names) = patient.name {
        for n in names {
            if n.family.is_none() && n.given.is_none() {
                errors.push("Warning: HumanName has neither family nor given".into());
            }
        }
    }

    errors
}

pub fn validate_observation(obs: &Observation) -> Vec<String> {
    let mut errors = Vec::new();

    if obs.resource_type != "Observation" {
        errors.push("resourceType must be \"Observation\"".into());
    }

    if obs.status.is_empty() {
        errors.push("Observation.status is required".into());
    }

    if obs.code.coding.is_none() && obs.code.text.is_none() {
        errors.push("Observation.code must have coding or text".into());
    }

    if obs.subject.is_none() {
        errors.push("Warning: Observation should have a subject reference".into());
    }

    if obs.value_quantity.is_none() && obs.value_sampled_data.is_none() && obs.component.is_none() {
        errors.push("Warning: Observation has no value".into());
    }

    errors
}

/// Validate the structural invariants a transaction bundle must satisfy: the
/// first entry is a Patient created via POST, and every subsequent entry
/// that carries a subject/patient reference points at that Patient's fullUrl.
pub fn validate_bundle(bundle: &Bundle) -> Vec<String> {
    let mut errors = Vec::new();

    if bundle.r#type != "transaction" {
        errors.push("Bundle.type must be \"transaction\"".into());
    }

    let Some(first) = bundle.entry.first() else {
        errors.push("Bundle must have at least one entry".into());
        return errors;
    };

    let patient_type = first.resource.get("resourceType").and_then(|v| v.as_str());
    if patient_type != Some("Patient") {
        errors.push("Bundle entry[0] must be a Patient resource".into());
    }
    match &first.request {
        Some(req) if req.method == "POST" && req.url == "Patient" => {}
        _ => errors.push("Bundle entry[0].request must be POST Patient".into()),
    }

    let patient_full_url = first.full_url.clone();

    for entry in bundle.entry.iter().skip(1) {
        let reference = entry
            .resource
            .get("subject")
            .or_else(|| entry.resource.get("patient"))
            .and_then(|r| r.get("reference"))
            .and_then(|v| v.as_str());
        if let (Some(reference), Some(patient_url)) = (reference, patient_full_url.as_deref()) {
            if reference != patient_url {
                errors.push(format!(
                    "entry references {} but Patient fullUrl is {}",
                    reference, patient_url
                ));
            }
        }
    }

    errors
}
