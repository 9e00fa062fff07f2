mod common;

use std::sync::Arc;

use common::{init_logger, quick_config, river_samples, CLASSES};
use riverstat_classifiers::data_handling::WaterSample;
use riverstat_classifiers::ensemble::argmax_rows;
use riverstat_classifiers::{run_training, InferenceService, ModelArtifact};
use serde_json::{json, Value};

fn trained_artifact(seed: u64) -> ModelArtifact {
    init_logger();
    let mut config = quick_config(3);
    config.search.seed = seed;
    run_training(&river_samples(12, seed), &config)
        .unwrap()
        .artifact
}

fn clean_request() -> Value {
    json!({
        "DO": 7.4, "DO_SAT": 93.0, "BOD": 1.1, "COD": 8.5,
        "SS": 14.0, "pH": 7.2, "NH3N": 0.1, "TEMP": 27.2
    })
}

#[test]
fn missing_temperature_is_a_bad_request() {
    let service = InferenceService::new(trained_artifact(1));
    let mut request = clean_request();
    request.as_object_mut().unwrap().remove("TEMP");

    let response = service.handle_request(&request);
    assert_eq!(response.status, 400);
    let message = response.body["error"].as_str().unwrap();
    assert!(message.contains("missing field"));
    assert!(message.contains("TEMP"));
}

#[test]
fn non_numeric_value_is_a_bad_request() {
    let service = InferenceService::new(trained_artifact(1));
    let mut request = clean_request();
    request["pH"] = json!("neutral");
    let response = service.handle_request(&request);
    assert_eq!(response.status, 400);

    let response = service.handle_request(&json!([1, 2, 3]));
    assert_eq!(response.status, 400);
}

#[test]
fn valid_request_returns_prediction() {
    let service = InferenceService::new(trained_artifact(2));
    let response = service.handle_request(&clean_request());
    assert_eq!(response.status, 200);

    let body = &response.body;
    let probabilities = body["probabilities"].as_object().unwrap();
    assert_eq!(probabilities.len(), CLASSES.len());
    let total: f64 = probabilities.values().map(|p| p.as_f64().unwrap()).sum();
    assert!((total - 1.0).abs() < 1e-6);

    let max = probabilities
        .values()
        .map(|p| p.as_f64().unwrap())
        .fold(f64::NEG_INFINITY, f64::max);
    let expected = (max * 100.0 * 100.0).round() / 100.0;
    assert_eq!(body["confidence"].as_f64().unwrap(), expected);

    let label = body["prediction"].as_str().unwrap();
    assert!(CLASSES.contains(&label));
    assert_eq!(probabilities[label].as_f64().unwrap(), max);
}

#[test]
fn key_order_does_not_matter() {
    let service = InferenceService::new(trained_artifact(2));
    let reordered: Value = serde_json::from_str(
        r#"{"TEMP": 27.2, "NH3N": 0.1, "pH": 7.2, "SS": 14.0,
            "COD": 8.5, "BOD": 1.1, "DO_SAT": 93.0, "DO": 7.4}"#,
    )
    .unwrap();
    assert_eq!(
        service.handle_request(&reordered),
        service.handle_request(&clean_request())
    );
}

#[test]
fn predictions_are_repeatable() {
    let service = InferenceService::new(trained_artifact(3));
    let sample = WaterSample::from_json(&clean_request()).unwrap();
    let first = service.predict(&sample).unwrap();
    let second = service.predict(&sample).unwrap();
    assert_eq!(first, second);
}

#[test]
fn saved_artifact_serves_the_same_predictions() {
    let artifact = trained_artifact(4);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ensemble.json");
    artifact.save(&path).unwrap();

    let sample = WaterSample::from_json(&clean_request()).unwrap();
    let in_memory = InferenceService::new(artifact).predict(&sample).unwrap();
    let from_disk = InferenceService::load(&path)
        .unwrap()
        .predict(&sample)
        .unwrap();
    assert_eq!(in_memory.label, from_disk.label);
    for (class, p) in &in_memory.probabilities {
        assert!((p - from_disk.probabilities[class]).abs() < 1e-6);
    }
}

#[test]
fn failed_reload_keeps_current_artifact() {
    let service = InferenceService::new(trained_artifact(5));
    let before = service.current();

    let dir = tempfile::tempdir().unwrap();
    let bad = dir.path().join("broken.json");
    std::fs::write(&bad, "not json").unwrap();
    assert!(service.reload(&bad).is_err());
    assert!(Arc::ptr_eq(&before, &service.current()));
}

#[test]
fn replace_swaps_artifact_for_new_readers() {
    let service = InferenceService::new(trained_artifact(6));
    let held = service.current();
    service.replace(trained_artifact(7));

    assert!(!Arc::ptr_eq(&held, &service.current()));
    // A reader that cloned the old artifact can keep using it.
    let sample = WaterSample::from_json(&clean_request()).unwrap();
    let raw = ndarray::Array2::from_shape_vec((1, 8), sample.to_array().to_vec()).unwrap();
    assert_eq!(held.predict_proba(&raw).unwrap().ncols(), 3);
}

#[test]
fn service_is_shareable_across_threads() {
    let service = Arc::new(InferenceService::new(trained_artifact(8)));
    let request = clean_request();
    let expected = service.handle_request(&request);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let service = Arc::clone(&service);
            let request = request.clone();
            std::thread::spawn(move || service.handle_request(&request))
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
}

#[test]
fn served_label_matches_ensemble_argmax() {
    let artifact = trained_artifact(9);
    let data = river_samples(4, 99);
    let raw = ndarray::Array2::from_shape_vec(
        (data.len(), 8),
        data.samples.iter().flat_map(|s| s.to_array().to_vec()).collect(),
    )
    .unwrap();
    let expected = argmax_rows(&artifact.predict_proba(&raw).unwrap());
    let names = artifact.class_names().to_vec();

    let service = InferenceService::new(artifact);
    for (sample, &code) in data.samples.iter().zip(expected.iter()) {
        let prediction = service.predict(sample).unwrap();
        assert_eq!(prediction.label, names[code]);
    }
}

#[test]
fn unparseable_body_is_a_bad_request() {
    let service = InferenceService::new(trained_artifact(1));
    let response = service.handle_body("DO=7.4&TEMP=27");
    assert_eq!(response.status, 400);
    assert!(response.body["error"]
        .as_str()
        .unwrap()
        .starts_with("invalid JSON"));

    let response = service.handle_body(&clean_request().to_string());
    assert_eq!(response, service.handle_request(&clean_request()));
}
