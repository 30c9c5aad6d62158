use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

// ── Scenario 1: hospital admission + bedside stream link to one patient ─────

#[test]
fn links_hospital_and_bedside_sources_into_one_bundle() {
    let output = tempdir().unwrap();
    let mut cmd = Command::cargo_bin("clinical-ingest-bridge").unwrap();
    cmd.args([
        "--input",
        "tests/fixtures/scenario_basic",
        "--output",
        output.path().to_str().unwrap(),
    ]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("ingested 2/2 files into 1 bundle(s)"));

    let entries: Vec<_> = fs::read_dir(output.path()).unwrap().collect();
    assert_eq!(entries.len(), 1);

    let contents = fs::read_to_string(entries[0].as_ref().unwrap().path()).unwrap();
    assert!(contents.contains("\"resourceType\": \"Bundle\""));
    assert!(contents.contains("\"type\": \"transaction\""));
    assert!(contents.contains("\"resourceType\": \"Patient\""));
    assert!(contents.contains("\"resourceType\": \"Encounter\""));
    assert!(contents.contains("\"resourceType\": \"Condition\""));
}

#[test]
fn patient_is_always_the_first_bundle_entry() {
    let output = tempdir().unwrap();
    let mut cmd = Command::cargo_bin("clinical-ingest-bridge").unwrap();
    cmd.args([
        "--input",
        "tests/fixtures/scenario_basic",
        "--output",
        output.path().to_str().unwrap(),
    ]);
    cmd.assert().success();

    let entries: Vec<_> = fs::read_dir(output.path()).unwrap().collect();
    let contents = fs::read_to_string(entries[0].as_ref().unwrap().path()).unwrap();
    let bundle: serde_json::Value = serde_json::from_str(&contents).unwrap();
    assert_eq!(bundle["entry"][0]["resource"]["resourceType"], "Patient");
    assert_eq!(bundle["entry"][0]["request"]["method"], "POST");
    assert_eq!(bundle["entry"][0]["request"]["url"], "Patient");
}

// ── Scenario 2: jittered ECG waveform is rejected, not crashed on ──────────

#[test]
fn jittered_waveform_produces_zero_bundles_and_is_tallied() {
    let output = tempdir().unwrap();
    let mut cmd = Command::cargo_bin("clinical-ingest-bridge").unwrap();
    cmd.args([
        "--input",
        "tests/fixtures/scenario_jitter",
        "--output",
        output.path().to_str().unwrap(),
    ]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("InconsistentSampling"));

    let entries: Vec<_> = fs::read_dir(output.path()).unwrap().collect();
    assert!(entries.is_empty());
}

// ── Scenario 3: Apple Health wearable export alone still produces a bundle ──

#[test]
fn wearable_only_input_produces_a_bundle() {
    let output = tempdir().unwrap();
    let mut cmd = Command::cargo_bin("clinical-ingest-bridge").unwrap();
    cmd.args([
        "--input",
        "tests/fixtures/scenario_wearable",
        "--output",
        output.path().to_str().unwrap(),
    ]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("ingested 1/1 files into 1 bundle(s)"));

    let entries: Vec<_> = fs::read_dir(output.path()).unwrap().collect();
    let contents = fs::read_to_string(entries[0].as_ref().unwrap().path()).unwrap();
    assert!(contents.contains("8867-4"));
    assert!(contents.contains("59408-5"));
}

// ── Scenario 4: a file no adapter recognizes is skipped, not fatal ──────────

#[test]
fn unclaimed_file_does_not_fail_the_run() {
    let output = tempdir().unwrap();
    let mut cmd = Command::cargo_bin("clinical-ingest-bridge").unwrap();
    cmd.args([
        "--input",
        "tests/fixtures/scenario_unclaimed",
        "--output",
        output.path().to_str().unwrap(),
    ]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("ingested 0/1 files into 0 bundle(s)"));
}

// ── Missing input directory → exit 1, not a panic ───────────────────────────

#[test]
fn rejects_nonexistent_input_directory() {
    let output = tempdir().unwrap();
    let mut cmd = Command::cargo_bin("clinical-ingest-bridge").unwrap();
    cmd.args([
        "--input",
        "tests/fixtures/does_not_exist",
        "--output",
        output.path().to_str().unwrap(),
    ]);

    cmd.assert().failure().code(1);
}

// ── Missing required argument → exit 2 (clap usage error) ───────────────────

#[test]
fn rejects_missing_required_arguments() {
    let mut cmd = Command::cargo_bin("clinical-ingest-bridge").unwrap();
    cmd.arg("--input").arg("tests/fixtures/scenario_basic");

    cmd.assert().failure().code(2);
}

// ── --scenario scopes input/output to a named subdirectory ──────────────────

#[test]
fn scenario_flag_scopes_to_a_named_subdirectory() {
    let input_root = tempdir().unwrap();
    let output_root = tempdir().unwrap();
    let scenario_dir = input_root.path().join("basic");
    fs::create_dir_all(&scenario_dir).unwrap();
    fs::copy(
        "tests/fixtures/scenario_basic/admission.hl7",
        scenario_dir.join("admission.hl7"),
    )
    .unwrap();

    let mut cmd = Command::cargo_bin("clinical-ingest-bridge").unwrap();
    cmd.args([
        "--input",
        input_root.path().to_str().unwrap(),
        "--output",
        output_root.path().to_str().unwrap(),
        "--scenario",
        "basic",
    ]);

    cmd.assert().success();
    assert!(output_root.path().join("basic").is_dir());
}
