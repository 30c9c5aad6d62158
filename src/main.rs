use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};

use clinical_ingest_bridge::adapters::ambulance_ems::AmbulanceEmsAdapter;
use clinical_ingest_bridge::adapters::handwritten_notes::HandwrittenNotesAdapter;
use clinical_ingest_bridge::adapters::hospital_ehr::HospitalEhrAdapter;
use clinical_ingest_bridge::adapters::realtime_vitals::RealtimeVitalsAdapter;
use clinical_ingest_bridge::adapters::scans_labs::ScansLabsAdapter;
use clinical_ingest_bridge::adapters::wearable::WearableAdapter;
use clinical_ingest_bridge::config::PipelineConfig;
use clinical_ingest_bridge::driver;
use clinical_ingest_bridge::registry::AdapterRegistry;
use clinical_ingest_bridge::vlm::{MockVlmClient, StructuredNote};

#[derive(Parser, Debug)]
#[command(name = "clinical-ingest-bridge")]
#[command(about = "Ingest clinical source files into per-patient FHIR transaction bundles")]
struct Cli {
    /// Directory of source files to ingest (hospital EHR, wearable, ambulance,
    /// bedside monitor, scans/labs, handwritten notes).
    #[arg(short, long)]
    input: PathBuf,

    /// Directory to write one `<canonical_id>.json` transaction bundle per
    /// linked patient.
    #[arg(short, long)]
    output: PathBuf,

    /// Optional named subdirectory of `input`/`output` to scope this run to
    /// one fixture scenario instead of the whole input tree.
    #[arg(short, long)]
    scenario: Option<String>,
}

fn build_registry() -> AdapterRegistry {
    let config = PipelineConfig::default();
    // Real deployments would inject a model-backed VlmClient here; absent a
    // network-reachable one, the deterministic stub keeps offline runs
    // reproducible.
    let vlm = Box::new(MockVlmClient::new(StructuredNote::default()));
    AdapterRegistry::new(vec![
        Box::new(HospitalEhrAdapter),
        Box::new(WearableAdapter),
        Box::new(AmbulanceEmsAdapter),
        Box::new(RealtimeVitalsAdapter),
        Box::new(ScansLabsAdapter),
        Box::new(HandwrittenNotesAdapter::new(vlm, &config)),
    ])
}

fn run(cli: Cli) -> Result<()> {
    let config = PipelineConfig::default();
    let registry = build_registry();

    let input_dir = match &cli.scenario {
        Some(name) => cli.input.join(name),
        None => cli.input.clone(),
    };
    let output_dir = match &cli.scenario {
        Some(name) => cli.output.join(name),
        None => cli.output.clone(),
    };

    if !input_dir.is_dir() {
        anyhow::bail!("input directory {:?} does not exist", input_dir);
    }

    let (written, summary) = driver::run(&registry, &config, &input_dir, &output_dir, None)
        .with_context(|| format!("ingest run over {:?} failed", input_dir))?;

    info!(
        "ingested {}/{} files into {} bundle(s)",
        summary.files_ingested, summary.files_seen, summary.bundles_written
    );
    if summary.errors_by_kind.is_empty() {
        println!(
            "ingested {}/{} files into {} bundle(s), no errors",
            summary.files_ingested, summary.files_seen, summary.bundles_written
        );
    } else {
        println!(
            "ingested {}/{} files into {} bundle(s), errors: {:?}",
            summary.files_ingested, summary.files_seen, summary.bundles_written, summary.errors_by_kind
        );
    }
    for path in &written {
        info!("wrote {:?}", path);
    }

    Ok(())
}

fn main() -> ExitCode {
    env_logger::init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            e.print().ok();
            return ExitCode::from(2);
        }
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
