use std::fs;

use anyhow::{Context, Result};
use clap::Parser;

use fhir_parser::fhir::bundle::Bundle;
use fhir_parser::fhir::condition::Condition;
use fhir_parser::fhir::diagnostic_report::DiagnosticReport;
use fhir_parser::fhir::document_reference::DocumentReference;
use fhir_parser::fhir::encounter::Encounter;
use fhir_parser::fhir::imaging_study::ImagingStudy;
use fhir_parser::fhir::observation::Observation;
use fhir_parser::fhir::patient::Patient;
use fhir_parser::output::{
    format_condition, format_diagnostic_report, format_document_reference, format_encounter,
    format_imaging_study, format_observation, format_patient,
};
use fhir_parser::validation::{validate_bundle, validate_observation, validate_patient};

#[derive(Parser, Debug)]
#[command(name = "fhir-parser")]
#[command(about = "Parse and summarize FHIR R4 resources")]
struct Cli {
    /// Path to FHIR JSON file
    #[arg(short, long)]
    file: String,

    /// Resource type: patient, observation, encounter, condition, diagnostic-report,
    /// imaging-study, document-reference, bundle
    #[arg(short, long)]
    resource_type: String,

    /// Validate the resource and print warnings/errors
    #[arg(short, long, default_value_t = false)]
    validate: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let content =
        fs::read_to_string(&cli.file).with_context(|| format!("Failed to read {}", cli.file))?;

    match cli.resource_type.as_str() {
        "patient" => {
            let patient: Patient =
                serde_json::from_str(&content).context("Invalid Patient JSON")?;
            if cli.validate {
                for e in validate_patient(&patient) {
                    eprintln!("[VALIDATE] {}", e);
                }
            }
            print!("{}", format_patient(&patient));
        }
        "observation" => {
            let obs: Observation =
                serde_json::from_str(&content).context("Invalid Observation JSON")?;
            if cli.validate {
                for e in validate_observation(&obs) {
                    eprintln!("[VALIDATE] {}", e);
                }
            }
            print!("{}", format_observation(&obs));
        }
        "encounter" => {
            let enc: Encounter =
                serde_json::from_str(&content).context("Invalid Encounter JSON")?;
            print!("{}", format_encounter(&enc));
        }
        "condition" => {
            let cond: Condition =
                serde_json::from_str(&content).context("Invalid Condition JSON")?;
            print!("{}", format_condition(&cond));
        }
        "diagnostic-report" => {
            let report: DiagnosticReport =
                serde_json::from_str(&content).context("Invalid DiagnosticReport JSON")?;
            print!("{}", format_diagnostic_report(&report));
        }
        "imaging-study" => {
            let study: ImagingStudy =
                serde_json::from_str(&content).context("Invalid ImagingStudy JSON")?;
            print!("{}", format_imaging_study(&study));
        }
        "document-reference" => {
            let doc: DocumentReference =
                serde_json::from_str(&content).context("Invalid DocumentReference JSON")?;
            print!("{}", format_document_reference(&doc));
        }
        "bundle" => {
            let bundle: Bundle =
                serde_json::from_str(&content).context("Invalid Bundle JSON")?;
            println!("## Bundle\n");
            println!("- **Type**: {}", bundle.r#type);
            println!("- **Entries**: {}", bundle.entry.len());
            if cli.validate {
                for e in validate_bundle(&bundle) {
                    eprintln!("[VALIDATE] {}", e);
                }
            }
        }
        other => anyhow::bail!("Unsupported resource type: {}", other),
    }

    Ok(())
}
