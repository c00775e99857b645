// SPDX-License-Identifier: MPL-2.0

//! Integration tests for constants module

use camera_session::backends::camera::PictureSize;
use camera_session::constants::{self, DualShotBudget, FOCUS_AREA_MAX, FOCUS_AREA_MIN};

#[test]
fn test_dual_shot_budget_default() {
    assert_eq!(DualShotBudget::default(), DualShotBudget::Independent);
}

#[test]
fn test_dual_shot_budget_serialized_names() {
    assert_eq!(
        serde_json::to_string(&DualShotBudget::SharedWithRecording).unwrap(),
        "\"shared_with_recording\""
    );
    let budget: DualShotBudget = serde_json::from_str("\"independent\"").unwrap();
    assert_eq!(budget, DualShotBudget::Independent);
}

#[test]
fn test_max_artifact_size_formula() {
    let size = PictureSize::new(4000, 3000);
    assert_eq!(constants::max_artifact_size(&size), 4000 * 3000 * 4 + 4096);
}

#[test]
fn test_max_artifact_size_grows_with_resolution() {
    let hd = constants::max_artifact_size(&PictureSize::new(1280, 720));
    let fhd = constants::max_artifact_size(&PictureSize::new(1920, 1080));
    assert!(hd < fhd);
}

#[test]
fn test_focus_area_bounds_symmetric() {
    assert_eq!(FOCUS_AREA_MIN, -FOCUS_AREA_MAX);
}

#[test]
fn test_version_not_empty() {
    assert!(!constants::app_info::version().is_empty());
}
