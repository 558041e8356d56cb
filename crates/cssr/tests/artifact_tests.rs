//! Integration tests for the result files.

use std::fs;

use cssr::{reconstruct, Artifacts, InferenceConfig, StateCatalogue};
use pretty_assertions::assert_eq;
use tempfile::tempdir;

fn alternating_artifacts() -> Artifacts {
    let data = "01".repeat(200);
    let automaton = reconstruct("01", &[&data], InferenceConfig::new(2)).unwrap();
    Artifacts::from_automaton(&automaton)
}

/// Test: All four files are written under the prefix
#[test]
fn test_write_all_files() {
    let dir = tempdir().unwrap();
    let artifacts = alternating_artifacts();
    let written = artifacts.write_to(dir.path(), "alt").unwrap();

    let names: Vec<String> = written
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        vec![
            "alt_results.txt",
            "alt_info.txt",
            "alt_inf.dot",
            "alt_state_series.txt"
        ]
    );

    let results = fs::read_to_string(dir.path().join("alt_results.txt")).unwrap();
    assert_eq!(results.matches("State number:").count(), 2);

    let info = fs::read_to_string(dir.path().join("alt_info.txt")).unwrap();
    assert!(info.contains("Number of Inferred States: 2"));
    assert!(info.contains("History Length: 2"));
    assert!(info.contains("Test: Kolmogorov-Smirnov"));

    let dot = fs::read_to_string(dir.path().join("alt_inf.dot")).unwrap();
    assert!(dot.starts_with("digraph"));
    assert_eq!(dot.matches(" -> ").count(), 2);

    let series = fs::read_to_string(dir.path().join("alt_state_series.txt")).unwrap();
    let line = series.lines().next().unwrap();
    assert_eq!(line.split(' ').count(), 400);
    assert!(line.starts_with("- "));
}

/// Test: A failed write leaves no partial output behind
#[test]
fn test_missing_directory_writes_nothing() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("does_not_exist");
    let result = alternating_artifacts().write_to(&missing, "alt");
    assert!(result.is_err());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

/// Test: An empty prefix is rejected before anything is rendered to disk
#[test]
fn test_empty_prefix_rejected() {
    let dir = tempdir().unwrap();
    let result = alternating_artifacts().write_to(dir.path(), "");
    assert!(result.unwrap_err().is_input_error());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

/// Test: Artifacts survive a JSON round trip
#[test]
fn test_json_export() {
    let artifacts = alternating_artifacts();
    let json = artifacts.to_json().unwrap();
    let back: Artifacts = serde_json::from_str(&json).unwrap();
    assert_eq!(back.catalogue, artifacts.catalogue);
    assert_eq!(back.report.num_states, 2);
}

/// Test: Catalogue entries carry transitions in alphabet order
#[test]
fn test_catalogue_contents() {
    let data = "011".repeat(200);
    let automaton = reconstruct("01", &[&data], InferenceConfig::new(3)).unwrap();
    let catalogue = StateCatalogue::from_automaton(&automaton);

    assert_eq!(catalogue.states.len(), 3);
    for entry in &catalogue.states {
        assert_eq!(entry.histories.len(), 1);
        assert_eq!(entry.transitions.len(), 1);
        let sum: f64 = entry.distribution.iter().map(|d| d.probability).sum();
        assert!((sum - 1.0).abs() < 1e-12);
    }
    let pi: f64 = catalogue.states.iter().map(|e| e.probability).sum();
    assert!((pi - 1.0).abs() < 1e-12);
}
