// SPDX-License-Identifier: MPL-2.0

//! Integration tests for configuration module

use camera_session::{Config, DualShotBudget};

#[test]
fn test_config_default() {
    let config = Config::default();

    assert_eq!(config.initial_camera, "back");
    assert!(config.dual_shutter, "Dual shutter should be enabled by default");
    assert!(!config.secure_mode);
    assert_eq!(config.dual_shot_budget, DualShotBudget::Independent);
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.json");

    let config = Config {
        initial_camera: "front".to_string(),
        secure_mode: true,
        dual_shot_budget: DualShotBudget::SharedWithRecording,
        focus_hold_ms: 250,
        ..Config::default()
    };
    config.save_to(&path).unwrap();

    let loaded = Config::load_from(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_config_missing_fields_use_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{ "secure_mode": true }"#).unwrap();

    let loaded = Config::load_from(&path).unwrap();
    assert!(loaded.secure_mode);
    assert_eq!(loaded.initial_camera, "back");
    assert_eq!(loaded.stop_timeout_ms, Config::default().stop_timeout_ms);
}

#[test]
fn test_config_rejects_invalid_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{ "stop_timeout_ms": 0 }"#).unwrap();
    assert!(Config::load_from(&path).is_err());

    std::fs::write(&path, r#"{ "initial_camera": "  " }"#).unwrap();
    assert!(Config::load_from(&path).is_err());

    std::fs::write(&path, "not json").unwrap();
    assert!(Config::load_from(&path).is_err());
}

#[test]
fn test_config_output_dir_override() {
    let config = Config {
        output_dir: Some("/tmp/camera-out".into()),
        ..Config::default()
    };
    assert_eq!(config.output_dir(), std::path::PathBuf::from("/tmp/camera-out"));
}
