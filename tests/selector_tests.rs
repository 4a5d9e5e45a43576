mod common;

use common::{FakeDevice, element, node};
use simagent::automation::{Automation, ResolvedBy};
use simagent::frame::store::{LoadedFrame, NoFrame};
use simagent::selector::fallback::{pick_intent_fallback, pick_system_fallback};
use simagent::selector::resolve::resolve;
use simagent::selector::{Selector, SelectorQuery};
use simagent::tree::element::Element;

fn saved(elements: Vec<Element>) -> LoadedFrame {
    LoadedFrame {
        elements,
        ..Default::default()
    }
}

// =========================================================================
// Query validation
// =========================================================================

#[test]
fn query_requires_exactly_one_selector() {
    let err = SelectorQuery::default().selector().unwrap_err();
    assert_eq!(err.code(), "USAGE");
    assert_eq!(err.to_string(), "selector is required: --index|--id|--label|--contains");

    let two = SelectorQuery {
        index: Some(1),
        label: Some("Login".into()),
        ..Default::default()
    };
    let err = two.selector().unwrap_err();
    assert_eq!(err.to_string(), "choose only one selector: --index|--id|--label|--contains");
}

#[test]
fn blank_strings_do_not_count_as_selectors() {
    let query = SelectorQuery {
        id: Some("  ".into()),
        contains: Some(" mail ".into()),
        ..Default::default()
    };
    assert_eq!(query.count(), 1);
    assert_eq!(query.selector().unwrap(), Selector::Contains("mail".into()), "Value is trimmed");
}

#[test]
fn selector_kinds() {
    assert_eq!(SelectorQuery::index(3).selector().unwrap().kind(), "index");
    assert!(SelectorQuery::id("x").selector().unwrap().is_direct());
    let label = SelectorQuery::label("Next").selector().unwrap();
    assert!(!label.is_direct());
    assert_eq!(label.text(), Some("Next"));
}

// =========================================================================
// Resolution against one element set
// =========================================================================

#[test]
fn not_found_messages_name_the_selector() {
    let elements = vec![element(1, "login", "Button", "Login", (0.0, 0.0, 80.0, 40.0))];

    let err = resolve(&elements, &Selector::Index(9)).unwrap_err();
    assert_eq!(err.code(), "ELEMENT_NOT_FOUND");
    assert_eq!(err.to_string(), "element index not found: 9");

    let err = resolve(&elements, &Selector::Id("nope".into())).unwrap_err();
    assert_eq!(err.to_string(), "element id not found: nope");

    let err = resolve(&elements, &Selector::Label("Sign Up".into())).unwrap_err();
    assert_eq!(err.to_string(), "element label not found: sign up");

    let err = resolve(&elements, &Selector::Contains("zzz".into())).unwrap_err();
    assert_eq!(err.to_string(), "element text not found: zzz");
}

#[test]
fn label_match_is_case_insensitive_and_checks_value_and_nearby() {
    let mut field = element(1, "email", "TextField", "", (0.0, 100.0, 300.0, 40.0));
    field.nearby_label = "Email".into();
    let mut filled = element(2, "name", "TextField", "", (0.0, 200.0, 300.0, 40.0));
    filled.value = "Taro".into();
    let elements = vec![field, filled];

    assert_eq!(resolve(&elements, &Selector::Label("EMAIL".into())).unwrap().id, "email");
    assert_eq!(resolve(&elements, &Selector::Label("taro".into())).unwrap().id, "name");
}

#[test]
fn visible_interactive_match_beats_hidden_one() {
    let mut hidden = element(1, "hidden", "Button", "Continue", (0.0, 900.0, 100.0, 44.0));
    hidden.visible = false;
    hidden.offscreen = true;
    let shown = element(2, "shown", "Button", "Continue", (0.0, 500.0, 100.0, 44.0));

    let picked = resolve(&[hidden, shown], &Selector::Label("Continue".into())).unwrap();
    assert_eq!(picked.id, "shown");
}

#[test]
fn ties_go_to_lowest_index() {
    let elements = vec![
        element(2, "second", "Button", "OK", (0.0, 200.0, 80.0, 40.0)),
        element(1, "first", "Button", "OK", (0.0, 100.0, 80.0, 40.0)),
    ];
    assert_eq!(resolve(&elements, &Selector::Label("ok".into())).unwrap().id, "first");
}

#[test]
fn disabled_elements_never_match_text() {
    let mut off = element(1, "off", "Button", "Send", (0.0, 0.0, 80.0, 40.0));
    off.enabled = false;
    assert!(resolve(&[off], &Selector::Contains("send".into())).is_err());
}

#[test]
fn contains_also_matches_role() {
    let elements = vec![
        element(1, "title", "StaticText", "Notifications", (0.0, 0.0, 200.0, 30.0)),
        element(2, "toggle", "Switch", "", (300.0, 0.0, 51.0, 31.0)),
    ];
    assert_eq!(resolve(&elements, &Selector::Contains("switch".into())).unwrap().id, "toggle");
}

// =========================================================================
// Fallback heuristics
// =========================================================================

#[test]
fn intent_fallback_prefers_top_leading_chrome_for_back() {
    let elements = vec![
        element(1, "back", "Button", "", (8.0, 44.0, 44.0, 44.0)),
        element(2, "save", "Button", "Save", (320.0, 44.0, 60.0, 44.0)),
        element(3, "body", "Button", "Continue", (20.0, 600.0, 350.0, 50.0)),
    ];
    assert_eq!(pick_intent_fallback(&elements, "Back").unwrap().id, "back");
    assert!(pick_intent_fallback(&elements, "Continue").is_none(), "No intent token, no guess");
}

#[test]
fn intent_fallback_prefers_small_switches_for_checkbox() {
    let elements = vec![
        element(1, "submit", "Button", "Submit", (20.0, 600.0, 350.0, 50.0)),
        element(2, "agree", "Switch", "", (300.0, 400.0, 51.0, 31.0)),
    ];
    assert_eq!(pick_intent_fallback(&elements, "terms checkbox").unwrap().id, "agree");
}

#[test]
fn system_fallback_maps_verbs_to_toolbar_ends() {
    let elements = vec![
        element(1, "cancel", "Button", "Cancel", (10.0, 50.0, 70.0, 44.0)),
        element(2, "save", "Button", "Save", (300.0, 52.0, 70.0, 44.0)),
        element(3, "body", "Button", "Row", (0.0, 400.0, 390.0, 44.0)),
    ];
    assert_eq!(pick_system_fallback(&elements, "Add").unwrap().id, "save", "Confirm verbs pick trailing");
    assert_eq!(pick_system_fallback(&elements, "cancel").unwrap().id, "cancel", "Cancel verbs pick leading");
    assert!(pick_system_fallback(&elements, "profile").is_none());
}

// =========================================================================
// Resolution chain: saved frame, live scan, fallbacks
// =========================================================================

#[test]
fn direct_selector_resolves_from_saved_frame_without_snapshot() {
    let device = FakeDevice::new(vec![]);
    let frame = saved(vec![element(1, "login", "Button", "Login", (0.0, 0.0, 80.0, 40.0))]);
    let automation = Automation::new(&device, &frame);

    let resolution = automation.resolve_element(&SelectorQuery::index(1), None).unwrap();
    assert_eq!(resolution.element.id, "login");
    assert_eq!(resolution.by, ResolvedBy::Frame);
    assert!(device.calls().is_empty(), "No live snapshot needed");
}

#[test]
fn direct_selector_needs_a_saved_frame() {
    let device = FakeDevice::new(vec![node("login", "Button", "Login", 0.0, 0.0, 80.0, 40.0)]);
    let frames = NoFrame;
    let automation = Automation::new(&device, &frames);

    let err = automation.resolve_element(&SelectorQuery::id("login"), None).unwrap_err();
    assert_eq!(err.code(), "NO_LAST_FRAME");
}

#[test]
fn text_selector_falls_back_to_live_scan() {
    let device = FakeDevice::new(vec![node("next", "Button", "Next", 20.0, 600.0, 350.0, 50.0)]);
    let frames = NoFrame;
    let automation = Automation::new(&device, &frames);

    let resolution = automation.resolve_element(&SelectorQuery::label("next"), None).unwrap();
    assert_eq!(resolution.element.id, "next");
    assert_eq!(resolution.by, ResolvedBy::LiveScan);
}

#[test]
fn stale_index_is_retried_against_live_tree() {
    let device = FakeDevice::new(vec![
        node("a", "Button", "A", 0.0, 0.0, 80.0, 40.0),
        node("b", "Button", "B", 0.0, 100.0, 80.0, 40.0),
    ]);
    let frame = saved(vec![element(1, "a", "Button", "A", (0.0, 0.0, 80.0, 40.0))]);
    let automation = Automation::new(&device, &frame);

    let resolution = automation.resolve_element(&SelectorQuery::index(2), None).unwrap();
    assert_eq!(resolution.element.id, "b");
    assert_eq!(resolution.by, ResolvedBy::LiveScan);
}

#[test]
fn intent_and_system_fallbacks_are_last_resort() {
    let device = FakeDevice::new(vec![
        node("back", "Button", "", 8.0, 44.0, 44.0, 44.0),
        node("title", "StaticText", "Settings", 150.0, 50.0, 100.0, 30.0),
        node("save", "Button", "Save", 320.0, 44.0, 60.0, 44.0),
        node("body", "Button", "Continue", 20.0, 600.0, 350.0, 50.0),
    ]);
    let frames = NoFrame;
    let automation = Automation::new(&device, &frames);

    let back = automation.resolve_element(&SelectorQuery::label("Back"), None).unwrap();
    assert_eq!(back.element.id, "back");
    assert_eq!(back.by, ResolvedBy::IntentFallback);

    let add = automation.resolve_element(&SelectorQuery::label("Add"), None).unwrap();
    assert_eq!(add.element.id, "save");
    assert_eq!(add.by, ResolvedBy::SystemFallback);
    assert!(add.by.is_fallback());
}

#[test]
fn unresolvable_text_reports_live_not_found() {
    let device = FakeDevice::new(vec![node("body", "Button", "Continue", 20.0, 600.0, 350.0, 50.0)]);
    let frames = NoFrame;
    let automation = Automation::new(&device, &frames);

    let err = automation.resolve_element(&SelectorQuery::contains("profile"), None).unwrap_err();
    assert_eq!(err.code(), "ELEMENT_NOT_FOUND");
    assert_eq!(err.to_string(), "element text not found: profile");
}
