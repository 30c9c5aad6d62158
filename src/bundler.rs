use fhir_parser::fhir::bundle::{Bundle, BundleEntry, BundleRequest};
use serde_json::Value;
use uuid::Uuid;

use crate::error::IngestError;
use crate::linker::LinkedPatient;

/// Build a transaction bundle for one canonical patient.
///
/// Patient is always entry 0 (`POST Patient`); every subsequent resource
/// gets a fresh `urn:uuid:` fullUrl and has its subject/patient reference
/// rewritten to point at the Patient's fullUrl, mirroring how a transaction
/// bundle is meant to be applied atomically by a downstream store.
pub fn create_patient_bundle(linked: &LinkedPatient) -> Result<Bundle, IngestError> {
    let patient = linked
        .fhir_patient
        .clone()
        .ok_or_else(|| IngestError::BundleMissingPatient {
            canonical_id: linked.canonical_id.clone(),
        })?;

    let patient_full_url = format!("urn:uuid:{}", Uuid::new_v4());
    let mut entries = vec![BundleEntry {
        full_url: Some(patient_full_url.clone()),
        resource: patient,
        request: Some(BundleRequest {
            method: "POST".to_string(),
            url: "Patient".to_string(),
        }),
    }];

    for resource in &linked.all_resources {
        let resource_type = resource
            .get("resourceType")
            .and_then(|v| v.as_str())
            .ok_or_else(|| IngestError::UnknownResourceType {
                resource_type: "<missing>".to_string(),
            })?
            .to_string();

        let mut resource = resource.clone();
        update_patient_reference(&mut resource, &patient_full_url);

        entries.push(BundleEntry {
            full_url: Some(format!("urn:uuid:{}", Uuid::new_v4())),
            resource,
            request: Some(BundleRequest {
                method: "POST".to_string(),
                url: resource_type,
            }),
        });
    }

    Ok(Bundle {
        resource_type: "Bundle".to_string(),
        id: Some(linked.canonical_id.clone()),
        meta: None,
        r#type: "transaction".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        entry: entries,
    })
}

/// Point a resource's `subject`/`patient` reference at the bundle's Patient
/// entry, if the resource carries one.
fn update_patient_reference(resource: &mut Value, patient_full_url: &str) {
    for key in ["subject", "patient"] {
        if let Some(obj) = resource.get_mut(key) {
            if obj.get("reference").is_some() {
                obj["reference"] = Value::String(patient_full_url.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linker::LinkedPatient;
    use serde_json::json;
    use std::collections::{BTreeMap, BTreeSet};

    fn sample_linked() -> LinkedPatient {
        let mut source_types = BTreeSet::new();
        source_types.insert("hospital_ehr".to_string());
        LinkedPatient {
            canonical_id: "abc123".to_string(),
            identities: vec![],
            fhir_patient: Some(json!({"resourceType": "Patient", "id": "p1"})),
            all_resources: vec![json!({
                "resourceType": "Observation",
                "status": "final",
                "subject": {"reference": "Patient/p1"},
            })],
            source_types,
            raw_metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn patient_is_first_entry_with_post() {
        let linked = sample_linked();
        let bundle = create_patient_bundle(&linked).unwrap();
        assert_eq!(bundle.entry.len(), 2);
        assert_eq!(bundle.entry[0].resource["resourceType"], "Patient");
        let req = bundle.entry[0].request.as_ref().unwrap();
        assert_eq!(req.method, "POST");
        assert_eq!(req.url, "Patient");
    }

    #[test]
    fn subject_reference_rewritten_to_patient_fullurl() {
        let linked = sample_linked();
        let bundle = create_patient_bundle(&linked).unwrap();
        let patient_full_url = bundle.entry[0].full_url.clone().unwrap();
        let obs_ref = bundle.entry[1].resource["subject"]["reference"].as_str().unwrap();
        assert_eq!(obs_ref, patient_full_url);
    }

    #[test]
    fn missing_patient_resource_is_an_error() {
        let mut linked = sample_linked();
        linked.fhir_patient = None;
        let err = create_patient_bundle(&linked).unwrap_err();
        assert!(matches!(err, IngestError::BundleMissingPatient { .. }));
    }
}
