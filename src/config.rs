/// Configuration for one pipeline run. Constructed once by the CLI and
/// passed by reference to the driver, adapters, and linker — there is no
/// global or thread-local configuration state in the core.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub loinc_system: String,
    pub snomed_system: String,
    pub icd10_system: String,
    pub ucum_system: String,
    pub mrn_system: String,
    pub abha_system: String,
    /// Deadline for the injected VLM client, in seconds.
    pub vlm_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            loinc_system: "http://loinc.org".to_string(),
            snomed_system: "http://snomed.info/sct".to_string(),
            icd10_system: "http://hl7.org/fhir/sid/icd-10".to_string(),
            ucum_system: "http://unitsofmeasure.org".to_string(),
            mrn_system: "urn:oid:2.16.840.1.113883.2.1.4.1".to_string(),
            abha_system: "https://healthid.ndhm.gov.in".to_string(),
            vlm_timeout_secs: 30,
        }
    }
}
