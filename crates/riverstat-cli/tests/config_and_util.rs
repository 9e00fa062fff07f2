//! Integration tests for CLI config parsing and util helpers.

use std::io::Write;
use std::path::Path;

use riverstat_cli::train::input::TrainConfig;
use riverstat_cli::util::{delimiter_for, read_request_body, validate_tsv_or_csv_file};

// ---------------------------------------------------------------------------
// validate_tsv_or_csv_file
// ---------------------------------------------------------------------------

#[test]
fn validate_csv_file_exists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("river.csv");
    std::fs::File::create(&path).unwrap();
    assert!(validate_tsv_or_csv_file(path.to_str().unwrap()).is_ok());
}

#[test]
fn validate_wrong_extension_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("river.xlsx");
    std::fs::File::create(&path).unwrap();
    assert!(validate_tsv_or_csv_file(path.to_str().unwrap()).is_err());
}

#[test]
fn validate_nonexistent_file_errors() {
    assert!(validate_tsv_or_csv_file("/nonexistent/path/river.csv").is_err());
}

// ---------------------------------------------------------------------------
// read_request_body / delimiter_for
// ---------------------------------------------------------------------------

#[test]
fn read_request_body_reads_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("request.json");
    let mut file = std::fs::File::create(&path).unwrap();
    write!(file, r#"{{"DO": 6.5, "TEMP": 28.0}}"#).unwrap();

    let body = read_request_body(Some(path.as_path())).unwrap();
    assert!(body.contains("\"DO\": 6.5"));
}

#[test]
fn read_request_body_missing_file_errors() {
    assert!(read_request_body(Some(Path::new("/nonexistent/request.json"))).is_err());
}

#[test]
fn delimiter_follows_extension() {
    assert_eq!(delimiter_for("river.tsv"), b'\t');
    assert_eq!(delimiter_for("RIVER.TSV"), b'\t');
    assert_eq!(delimiter_for("river.csv"), b',');
}

// ---------------------------------------------------------------------------
// TrainConfig defaults & serialization
// ---------------------------------------------------------------------------

#[test]
fn train_config_default_values() {
    let cfg = TrainConfig::default();
    assert_eq!(cfg.label_column, "RIVER STATUS");
    assert_eq!(cfg.training.search.n_trials, 500);
    assert_eq!(cfg.training.search.seed, 42);
    assert!(cfg.data_file.is_empty());
}

#[test]
fn train_config_partial_json_uses_defaults() {
    let cfg: TrainConfig = serde_json::from_str(
        r#"{"data_file": "river.csv", "training": {"search": {"n_trials": 20}}}"#,
    )
    .unwrap();
    assert_eq!(cfg.data_file, "river.csv");
    assert_eq!(cfg.training.search.n_trials, 20);
    assert_eq!(cfg.training.search.n_folds, 5);
    assert_eq!(cfg.artifact_file, TrainConfig::default().artifact_file);
}

#[test]
fn train_config_serializes() {
    let json = serde_json::to_string(&TrainConfig::default()).unwrap();
    assert!(json.contains("report_file"));
    assert!(json.contains("k_neighbors"));
}
