mod common;

use std::time::Duration;

use common::{FakeDevice, elements_of, node, transport_failure};
use serde_json::json;
use simagent::sync::stability::{StabilitySampler, all_strings_equal, hash_element_set};
use simagent::sync::wait::{WaitCondition, matching_text_samples, wait_for_condition};
use simagent::tree::normalize::NormalizeOptions;

fn tree(label: &str) -> String {
    json!([node("b", "Button", label, 0.0, 0.0, 100.0, 44.0)]).to_string()
}

fn quick(has_text: Option<&str>, interactive_min: Option<usize>, timeout_ms: u64) -> WaitCondition {
    WaitCondition {
        has_text: has_text.map(str::to_string),
        interactive_min,
        timeout: Duration::from_millis(timeout_ms),
        interval: Duration::from_millis(1),
    }
}

// =========================================================================
// Stability sampling
// =========================================================================

#[test]
fn all_strings_equal_cases() {
    assert!(all_strings_equal(&[]));
    assert!(all_strings_equal(&["a".to_string()]));
    assert!(all_strings_equal(&["a".to_string(), "a".to_string()]));
    assert!(!all_strings_equal(&["a".to_string(), "a".to_string(), "b".to_string()]));
}

#[test]
fn hash_tracks_observable_changes_only() {
    let a = elements_of(&[node("b", "Button", "Save", 0.0, 0.0, 100.0, 44.0)]);
    let same = elements_of(&[node("b", "button", " Save ", 0.0, 0.0, 100.0, 44.0)]);
    let moved = elements_of(&[node("b", "Button", "Save", 0.0, 10.0, 100.0, 44.0)]);

    assert_eq!(hash_element_set(&a), hash_element_set(&same), "Role case and label padding are ignored");
    assert_ne!(hash_element_set(&a), hash_element_set(&moved));
    assert_eq!(hash_element_set(&a).len(), 40, "Hex sha1");
}

#[test]
fn identical_samples_are_stable() {
    let device = FakeDevice::new(vec![]);
    for _ in 0..3 {
        device.script_snapshot(Ok(tree("Save")));
    }
    let opts = NormalizeOptions::default();

    let samples = StabilitySampler::new(&device, &opts, 3, Duration::ZERO).sample().unwrap();
    assert_eq!(samples.len(), 3);
    assert_eq!(samples[2].elements.elements[0].label, "Save");
}

#[test]
fn changing_tree_is_frame_unstable() {
    let device = FakeDevice::new(vec![]);
    device.script_snapshot(Ok(tree("Loading")));
    device.script_snapshot(Ok(tree("Save")));
    device.script_snapshot(Ok(tree("Save")));
    let opts = NormalizeOptions::default();

    let err = StabilitySampler::new(&device, &opts, 3, Duration::from_millis(1))
        .sample()
        .unwrap_err();
    assert_eq!(err.code(), "FRAME_UNSTABLE");
    let details = err.details();
    assert_eq!(details["samples"], json!(3));
    assert_eq!(details["hashes"].as_array().map(Vec::len), Some(3));
    assert_eq!(details["interval"], json!("1ms"));
}

#[test]
fn stable_sampling_needs_two_samples() {
    let device = FakeDevice::new(vec![]);
    let opts = NormalizeOptions::default();
    let err = StabilitySampler::new(&device, &opts, 1, Duration::ZERO).sample().unwrap_err();
    assert_eq!(err.code(), "USAGE");
}

#[test]
fn unparseable_snapshot_is_kept_raw() {
    let device = FakeDevice::new(vec![]);
    device.script_snapshot(Ok("not json".to_string()));
    let opts = NormalizeOptions::default();

    let sample = StabilitySampler::new(&device, &opts, 2, Duration::ZERO).sample_once().unwrap();
    assert_eq!(sample.raw, json!({ "raw": "not json" }));
    assert!(sample.elements.is_empty());
}

// =========================================================================
// Wait
// =========================================================================

#[test]
fn wait_condition_validation() {
    let err = quick(None, None, 10).validate().unwrap_err();
    assert_eq!(err.to_string(), "ui wait requires --has-text and/or --interactive-min");
    assert!(quick(Some("  "), None, 10).validate().is_err(), "Blank text is no condition");
    assert_eq!(quick(Some("x"), None, 0).validate().unwrap_err().to_string(), "--timeout must be > 0");
}

#[test]
fn wait_succeeds_on_first_matching_snapshot() {
    let device = FakeDevice::new(vec![
        node("next", "Button", "Next", 0.0, 600.0, 390.0, 50.0),
        node("title", "StaticText", "Welcome", 0.0, 50.0, 390.0, 30.0),
    ]);

    let outcome = wait_for_condition(&device, &quick(Some("NEXT"), Some(1), 1000)).unwrap();
    assert_eq!(outcome.attempts, 1);
    assert_eq!(outcome.interactive, 1);
    assert_eq!(outcome.matches, Some(vec!["Next".to_string()]));
    assert_eq!(outcome.has_text.as_deref(), Some("NEXT"));
}

#[test]
fn wait_polls_until_text_appears() {
    let device = FakeDevice::new(vec![node("done", "StaticText", "Done!", 0.0, 0.0, 100.0, 30.0)]);
    device.script_snapshot(Ok("[]".to_string()));

    let outcome = wait_for_condition(&device, &quick(Some("done"), None, 5000)).unwrap();
    assert_eq!(outcome.attempts, 2);
    assert_eq!(outcome.interactive, 0);
}

#[test]
fn wait_times_out_with_diagnostics() {
    let device = FakeDevice::new(vec![node("b", "Button", "Only", 0.0, 0.0, 100.0, 44.0)]);

    let err = wait_for_condition(&device, &quick(None, Some(5), 5)).unwrap_err();
    assert_eq!(err.code(), "WAIT_TIMEOUT");
    let details = err.details();
    assert_eq!(details["interactive"], json!(1));
    assert_eq!(details["interactiveMin"], json!(5));
    assert!(details["attempts"].as_u64().unwrap() >= 1);
    assert!(details.get("hasText").is_none());
}

#[test]
fn wait_reports_last_snapshot_error() {
    let device = FakeDevice::new(vec![]);
    for _ in 0..200 {
        device.script_snapshot(Err(transport_failure()));
    }

    let err = wait_for_condition(&device, &quick(Some("ready"), None, 5)).unwrap_err();
    assert_eq!(err.code(), "WAIT_TIMEOUT");
    let details = err.details();
    assert_eq!(details["lastError"]["code"], json!("IDB_UI_FAILED"));
    assert_eq!(details["lastMatches"], json!([]));
}

#[test]
fn text_samples_are_capped() {
    let nodes: Vec<_> = (0..5)
        .map(|i| node(&format!("r{}", i), "Cell", &format!("Row {}", i), 0.0, i as f64 * 50.0, 390.0, 44.0))
        .collect();
    let samples = matching_text_samples(&elements_of(&nodes), "row");
    assert_eq!(samples, vec!["Row 0", "Row 1", "Row 2"]);
}
