use crate::fhir::condition::Condition;
use crate::fhir::diagnostic_report::DiagnosticReport;
use crate::fhir::document_reference::DocumentReference;
use crate::fhir::encounter::Encounter;
use crate::fhir::imaging_study::ImagingStudy;
use crate::fhir::observation::Observation;
use crate::fhir::patient::Patient;

pub fn format_patient(patient: &Patient) -> String {
    let mut out = String::from("## Patient\n\n");

    if let Some(ref id) = patient.id {
        out.push_str(&format!("- **ID**: {}\n", id));
    }

    if let Some(ref names) = patient.name {
        for n in names {
            let given = n.given.as_ref().map(|g| g.join(" ")).unwrap_or_default();
            let family = n.family.as_deref().unwrap_or("");
            out.push_str(&format!("- **Name**: {} {}\n", given, family));
        }
    }

    if let Some(ref gender) = patient.gender {
        out.push_str(&format!("- **Gender**: {}\n", gender));
    }

    if let Some(ref dob) = patient.birth_date {
        out.push_str(&format!("- **Birth Date**: {}\n", dob));
    }

    if let Some(ref ids) = patient.identifier {
        for ident in ids {
            let sys = ident.system.as_deref().unwrap_or("unknown");
            out.push_str(&format!("- **Identifier** ({}): {}\n", sys, ident.value));
        }
    }

    if let Some(ref addrs) = patient.address {
        for a in addrs {
            let city = a.city.as_deref().unwrap_or("");
            let country = a.country.as_deref().unwrap_or("");
            out.push_str(&format!("- **Address**: {}, {}\n", city, country));
        }
    }

    out
}

pub fn format_observation(obs: &Observation) -> String {
    let mut out = String::from("## Observation\n\n");

    if let Some(ref id) = obs.id {
        out.push_str(&format!("- **ID**: {}\n", id));
    }

    out.push_str(&format!("- **Status**: {}\n", obs.status));

    if let Some(ref text) = obs.code.text {
        out.push_str(&format!("- **Code**: {}\n", text));
    } else if let Some(ref codings) = obs.code.coding {
        if let Some(c) = codings.first() {
            let display = c.display.as_deref().unwrap_or("n/a");
            let code = c.code.as_deref().unwrap_or("n/a");
            out.push_str(&format!("- **Code**: {} ({})\n", display, code));
        }
    }

    if let Some(ref subj) = obs.subject {
        if let Some(ref r) = subj.reference {
            out.push_str(&format!("- **Subject**: {}\n", r));
        }
    }

    if let Some(ref q) = obs.value_quantity {
        let unit = q.unit.as_deref().unwrap_or("");
        out.push_str(&format!("- **Value**: {} {}\n", q.value, unit));
    }

    if let Some(ref sd) = obs.value_sampled_data {
        let n = sd.data.split_whitespace().count();
        out.push_str(&format!(
            "- **Sampled Data**: {} samples, period {}ms\n",
            n, sd.period
        ));
    }

    out
}

pub fn format_encounter(enc: &Encounter) -> String {
    let mut out = String::from("## Encounter\n\n");

    if let Some(ref id) = enc.id {
        out.push_str(&format!("- **ID**: {}\n", id));
    }

    out.push_str(&format!("- **Status**: {}\n", enc.status));

    if let Some(ref r) = enc.subject.reference {
        out.push_str(&format!("- **Subject**: {}\n", r));
    }

    if let Some(ref period) = enc.period {
        if let Some(ref start) = period.start {
            out.push_str(&format!("- **Period Start**: {}\n", start));
        }
    }

    out
}

pub fn format_condition(cond: &Condition) -> String {
    let mut out = String::from("## Condition\n\n");

    if let Some(ref id) = cond.id {
        out.push_str(&format!("- **ID**: {}\n", id));
    }

    if let Some(ref code) = cond.code {
        if let Some(ref text) = code.text {
            out.push_str(&format!("- **Code**: {}\n", text));
        }
    }

    if let Some(ref status) = cond.clinical_status {
        if let Some(ref text) = status.text {
            out.push_str(&format!("- **Clinical Status**: {}\n", text));
        }
    }

    out
}

pub fn format_diagnostic_report(report: &DiagnosticReport) -> String {
    let mut out = String::from("## DiagnosticReport\n\n");

    if let Some(ref id) = report.id {
        out.push_str(&format!("- **ID**: {}\n", id));
    }

    out.push_str(&format!("- **Status**: {}\n", report.status));

    if let Some(ref results) = report.result {
        out.push_str(&format!("- **Result count**: {}\n", results.len()));
    }

    out
}

pub fn format_imaging_study(study: &ImagingStudy) -> String {
    let mut out = String::from("## ImagingStudy\n\n");

    if let Some(ref id) = study.id {
        out.push_str(&format!("- **ID**: {}\n", id));
    }

    out.push_str(&format!("- **Status**: {}\n", study.status));
    out.push_str(&format!("- **Started**: {}\n", study.started));

    out
}

pub fn format_document_reference(doc: &DocumentReference) -> String {
    let mut out = String::from("## DocumentReference\n\n");

    if let Some(ref id) = doc.id {
        out.push_str(&format!("- **ID**: {}\n", id));
    }

    out.push_str(&format!("- **Status**: {}\n", doc.status));

    for c in &doc.content {
        out.push_str(&format!("- **Content**: {}\n", c.attachment.content_type));
    }

    out
}
