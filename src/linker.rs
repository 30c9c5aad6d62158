use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde_json::Value;
use sha1::{Digest, Sha1};

use crate::identity::{AdapterResult, PatientIdentity};

/// One canonical patient after cross-source clustering.
#[derive(Debug, Clone)]
pub struct LinkedPatient {
    pub canonical_id: String,
    pub identities: Vec<PatientIdentity>,
    pub fhir_patient: Option<Value>,
    pub all_resources: Vec<Value>,
    pub source_types: BTreeSet<String>,
    pub raw_metadata: BTreeMap<String, Value>,
}

impl LinkedPatient {
    fn new(canonical_id: String, identity: PatientIdentity, result: AdapterResult) -> Self {
        let mut source_types = BTreeSet::new();
        source_types.insert(result.source_type.clone());
        let mut raw_metadata = BTreeMap::new();
        if !result.raw_metadata.is_empty() {
            raw_metadata.insert(
                result.source_type.clone(),
                serde_json::to_value(&result.raw_metadata).unwrap_or(Value::Null),
            );
        }
        Self {
            canonical_id,
            identities: vec![identity],
            fhir_patient: result.fhir_patient,
            all_resources: result.fhir_resources,
            source_types,
            raw_metadata,
        }
    }

    /// Merge another source's contribution into this cluster. Missing
    /// fields on the chosen identity accept the incoming value; conflicting
    /// non-missing fields keep the earlier value and record the alternative.
    fn absorb(&mut self, identity: PatientIdentity, mut result: AdapterResult) {
        self.source_types.insert(result.source_type.clone());
        self.all_resources.append(&mut result.fhir_resources);
        if self.fhir_patient.is_none() {
            self.fhir_patient = result.fhir_patient;
        }

        let mut conflicts: BTreeMap<String, Value> = BTreeMap::new();
        {
            let primary = self.identities.first_mut().expect("cluster always has ≥1 identity");
            merge_field(&mut primary.full_name, &identity.full_name, "full_name", &mut conflicts);
            merge_field(&mut primary.given_name, &identity.given_name, "given_name", &mut conflicts);
            merge_field(&mut primary.family_name, &identity.family_name, "family_name", &mut conflicts);
            merge_field(&mut primary.birth_date, &identity.birth_date, "birth_date", &mut conflicts);
            merge_field(&mut primary.gender, &identity.gender, "gender", &mut conflicts);
            merge_field(&mut primary.phone, &identity.phone, "phone", &mut conflicts);
            merge_field(&mut primary.email, &identity.email, "email", &mut conflicts);
            merge_field(&mut primary.mrn, &identity.mrn, "mrn", &mut conflicts);
            merge_field(&mut primary.abha_id, &identity.abha_id, "abha_id", &mut conflicts);
        }
        if !conflicts.is_empty() {
            self.raw_metadata.insert(
                "conflicts".to_string(),
                serde_json::to_value(&conflicts).unwrap_or(Value::Null),
            );
        }
        self.identities.push(identity);
    }
}

fn merge_field(
    current: &mut Option<String>,
    incoming: &Option<String>,
    field_name: &str,
    conflicts: &mut BTreeMap<String, Value>,
) {
    match (&current, incoming) {
        (None, Some(v)) => *current = Some(v.clone()),
        (Some(existing), Some(incoming_v)) if existing != incoming_v => {
            conflicts.insert(field_name.to_string(), Value::String(incoming_v.clone()));
        }
        _ => {}
    }
}

fn normalize_name(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect()
}

fn normalize_phone(s: &str) -> String {
    let mut out = String::new();
    for (i, c) in s.chars().enumerate() {
        if c == '+' && i == 0 {
            out.push(c);
        } else if c.is_ascii_digit() {
            out.push(c);
        }
    }
    out
}

/// The four canonical-key families, in descending priority. `Triple` is the
/// normalized `(family, given, birth_date)` tuple — the weakest key that
/// still counts as "canonical" rather than a singleton fallback.
enum CanonicalKey {
    Abha(String),
    Mrn(String),
    Triple(String),
    Phone(String),
    Email(String),
}

impl CanonicalKey {
    fn tag(&self) -> &'static str {
        match self {
            CanonicalKey::Abha(_) => "abha_id",
            CanonicalKey::Mrn(_) => "mrn",
            CanonicalKey::Triple(_) => "triple",
            CanonicalKey::Phone(_) => "phone",
            CanonicalKey::Email(_) => "email",
        }
    }

    fn value(&self) -> &str {
        match self {
            CanonicalKey::Abha(v)
            | CanonicalKey::Mrn(v)
            | CanonicalKey::Triple(v)
            | CanonicalKey::Phone(v)
            | CanonicalKey::Email(v) => v,
        }
    }

    fn index_key(&self) -> String {
        format!("{}:{}", self.tag(), self.value())
    }
}

/// Every canonical key present on an identity, highest priority first.
fn canonical_keys(identity: &PatientIdentity) -> Vec<CanonicalKey> {
    let mut keys = Vec::new();
    if let Some(ref v) = identity.abha_id {
        keys.push(CanonicalKey::Abha(v.clone()));
    }
    if let Some(ref v) = identity.mrn {
        keys.push(CanonicalKey::Mrn(v.clone()));
    }
    if let (Some(family), Some(given), Some(dob)) =
        (&identity.family_name, &identity.given_name, &identity.birth_date)
    {
        let triple = format!("{}|{}|{}", normalize_name(family), normalize_name(given), dob);
        keys.push(CanonicalKey::Triple(triple));
    }
    if let Some(ref v) = identity.phone {
        keys.push(CanonicalKey::Phone(normalize_phone(v)));
    }
    if let Some(ref v) = identity.email {
        keys.push(CanonicalKey::Email(v.to_lowercase()));
    }
    keys
}

fn derive_canonical_id(seed: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(seed.as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)[..16].to_string()
}

/// Online, insertion-order clustering of `PatientIdentity` records into
/// canonical patients. Deterministic under a fixed input order; never
/// re-clusters a cluster once created, even if a later record would have
/// merged two existing clusters.
#[derive(Default)]
pub struct PatientLinker {
    index: HashMap<String, String>,
    clusters: Vec<LinkedPatient>,
    cluster_lookup: HashMap<String, usize>,
}

impl PatientLinker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one adapter's output into the linker.
    pub fn absorb(&mut self, result: AdapterResult) {
        let identity = result.patient_identity.clone();
        let keys = canonical_keys(&identity);

        let mut found: Option<String> = None;
        let mut shared_count: BTreeMap<String, usize> = BTreeMap::new();
        for key in &keys {
            if let Some(cid) = self.index.get(&key.index_key()) {
                *shared_count.entry(cid.clone()).or_insert(0) += 1;
            }
        }
        if let Some((cid, _)) = shared_count.into_iter().max_by_key(|(_, n)| *n) {
            found = Some(cid);
        }

        let canonical_id = match found {
            Some(cid) => cid,
            None => {
                let seed = keys
                    .first()
                    .map(|k| k.value().to_string())
                    .unwrap_or_else(|| identity.source_id.clone());
                derive_canonical_id(&seed)
            }
        };

        for key in &keys {
            self.index.insert(key.index_key(), canonical_id.clone());
        }

        match self.cluster_lookup.get(&canonical_id) {
            Some(&idx) => self.clusters[idx].absorb(identity, result),
            None => {
                let idx = self.clusters.len();
                self.clusters
                    .push(LinkedPatient::new(canonical_id.clone(), identity, result));
                self.cluster_lookup.insert(canonical_id, idx);
            }
        }
    }

    /// Finalize clustering; consumes the linker and returns the clusters in
    /// the order they were first created.
    pub fn finish(self) -> Vec<LinkedPatient> {
        self.clusters
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::AdapterResult;

    fn identity_with_mrn(mrn: &str) -> PatientIdentity {
        PatientIdentity {
            source_id: format!("src-{}", mrn),
            source_system: "test".to_string(),
            mrn: Some(mrn.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn same_mrn_links_to_same_canonical_id() {
        let mut linker = PatientLinker::new();
        linker.absorb(AdapterResult::new(identity_with_mrn("MRN-1"), "hospital_ehr"));
        linker.absorb(AdapterResult::new(identity_with_mrn("MRN-1"), "wearable"));
        let clusters = linker.finish();
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].source_types.len(), 2);
    }

    #[test]
    fn different_mrn_creates_separate_clusters() {
        let mut linker = PatientLinker::new();
        linker.absorb(AdapterResult::new(identity_with_mrn("MRN-1"), "hospital_ehr"));
        linker.absorb(AdapterResult::new(identity_with_mrn("MRN-2"), "hospital_ehr"));
        let clusters = linker.finish();
        assert_eq!(clusters.len(), 2);
        assert_ne!(clusters[0].canonical_id, clusters[1].canonical_id);
    }

    #[test]
    fn abha_takes_priority_over_mrn_for_linking() {
        let mut linker = PatientLinker::new();
        let first = PatientIdentity {
            source_id: "s1".to_string(),
            source_system: "test".to_string(),
            abha_id: Some("12-3456-7890-1234".to_string()),
            mrn: Some("X".to_string()),
            ..Default::default()
        };
        let second = PatientIdentity {
            source_id: "s2".to_string(),
            source_system: "test".to_string(),
            abha_id: Some("12-3456-7890-1234".to_string()),
            mrn: Some("Y".to_string()),
            ..Default::default()
        };
        linker.absorb(AdapterResult::new(first, "ambulance_ems"));
        linker.absorb(AdapterResult::new(second, "hospital_ehr"));
        let clusters = linker.finish();
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].identities[0].mrn.as_deref(), Some("X"));
    }

    #[test]
    fn singleton_with_no_canonical_key_is_deterministic() {
        let identity = PatientIdentity {
            source_id: "scans_labs/report.pdf".to_string(),
            source_system: "test".to_string(),
            ..Default::default()
        };
        let a = derive_canonical_id(&identity.source_id);
        let b = derive_canonical_id(&identity.source_id);
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }
}
