use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use serde_json::json;
use simagent::automation::{Direction, TapTarget, Unit};
use simagent::cli::commands::{UiAction, frame_options, ui_action};
use simagent::cli::config::{AppConfig, Cli, Commands, FrameArgs, Settings, UiCommand, build_settings, load_config, read_config};
use simagent::cli::output::Rendered;
use simagent::error::SimError;
use simagent::frame::capture::ImageFormat;
use simagent::selector::SelectorQuery;
use simagent::tree::normalize::OrderMode;

fn parse(args: &[&str]) -> Cli {
    let mut full = vec!["simagent"];
    full.extend_from_slice(args);
    Cli::parse_from(full)
}

fn default_settings() -> Settings {
    build_settings(&parse(&[]), &AppConfig::default())
}

fn ui(args: &[&str]) -> Result<UiAction, SimError> {
    let mut full = vec!["ui"];
    full.extend_from_slice(args);
    match parse(&full).command {
        Some(Commands::Ui { command }) => ui_action(&command, &default_settings()),
        other => panic!("expected a ui command, got {:?}", other),
    }
}

fn ui_err(args: &[&str]) -> String {
    let err = ui(args).unwrap_err();
    assert_eq!(err.code(), "USAGE", "Argument problems are usage errors");
    err.to_string()
}

fn frame_args(args: &[&str]) -> FrameArgs {
    let mut full = vec!["frame"];
    full.extend_from_slice(args);
    match parse(&full).command {
        Some(Commands::Frame(args)) => args,
        other => panic!("expected frame, got {:?}", other),
    }
}

// =========================================================================
// Global flags
// =========================================================================

#[test]
fn global_flags_parse_anywhere() {
    let cli = parse(&["ui", "button", "home", "--json", "-vv", "--target", "booted", "--trace", "t.jsonl"]);
    assert!(cli.json);
    assert_eq!(cli.verbose, 2);
    assert_eq!(cli.target.as_deref(), Some("booted"));
    assert_eq!(cli.trace, Some(PathBuf::from("t.jsonl")));
    assert!(!cli.quiet);
}

#[test]
fn timeout_flag_is_humantime() {
    let cli = parse(&["--timeout", "1500ms", "target", "list"]);
    assert_eq!(cli.timeout, Some(Duration::from_millis(1500)));
    assert!(Cli::try_parse_from(["simagent", "--timeout", "soon", "target", "list"]).is_err());
}

#[test]
fn no_subcommand_is_allowed_by_the_parser() {
    assert!(parse(&[]).command.is_none());
}

// =========================================================================
// ui tap / type / clear
// =========================================================================

#[test]
fn tap_coordinates_or_selector() {
    assert_eq!(
        ui(&["tap", "10", "20"]).unwrap(),
        UiAction::Tap {
            target: TapTarget::Point { x: 10.0, y: 20.0, unit: Unit::Pt },
            from: None,
        }
    );
    assert_eq!(
        ui(&["tap", "300", "600", "--unit", "px", "--from", "f/elements.json"]).unwrap(),
        UiAction::Tap {
            target: TapTarget::Point { x: 300.0, y: 600.0, unit: Unit::Px },
            from: Some(PathBuf::from("f/elements.json")),
        }
    );
    assert_eq!(
        ui(&["tap", "--label", "Login"]).unwrap(),
        UiAction::Tap {
            target: TapTarget::Element(SelectorQuery::label("Login")),
            from: None,
        }
    );
}

#[test]
fn tap_rejects_mixed_or_partial_targets() {
    assert!(ui_err(&["tap", "10"]).starts_with("usage: simagent ui tap"));
    assert!(ui_err(&["tap", "10", "20", "--id", "a"]).starts_with("usage: simagent ui tap"));
    assert!(ui_err(&["tap"]).starts_with("usage: simagent ui tap"));
    assert_eq!(
        ui_err(&["tap", "--id", "a", "--index", "1"]),
        "choose only one selector: --index|--id|--label|--contains"
    );
    assert_eq!(ui_err(&["tap", "1", "2", "--unit", "cm"]), "--unit must be pt|px");
}

#[test]
fn type_joins_positional_words() {
    let UiAction::Type { request, .. } = ui(&["type", "hello", "world"]).unwrap() else {
        panic!("expected type");
    };
    assert_eq!(request.text, "hello world");
    assert!(request.into.is_none());
    assert_eq!(request.focus_retries, default_settings().focus_retries);
}

#[test]
fn type_into_with_flags() {
    let UiAction::Type { request, .. } = ui(&[
        "type", "--text", "a@b.c", "--into", "--id", "email", "--replace", "--ascii", "--verify", "--focus-retries", "5",
    ])
    .unwrap() else {
        panic!("expected type");
    };
    assert_eq!(request.into, Some(SelectorQuery::id("email")));
    assert!(request.replace && request.ascii && request.verify);
    assert!(!request.paste);
    assert_eq!(request.focus_retries, 5);
}

#[test]
fn type_argument_errors() {
    assert_eq!(
        ui_err(&["type", "--text", "a", "b"]),
        "use either --text or positional text, not both"
    );
    assert!(ui_err(&["type"]).starts_with("usage: simagent ui type"));
    assert_eq!(ui_err(&["type", "x", "--replace"]), "--replace requires --into");
    assert_eq!(ui_err(&["type", "x", "--id", "a"]), "selector flags require --into");
    assert_eq!(
        ui_err(&["type", "x", "--into"]),
        "--into requires exactly one selector: --index|--id|--label|--contains"
    );
    assert_eq!(
        ui_err(&["type", "x", "--into", "--id", "a", "--focus-retries", "0"]),
        "--focus-retries must be >= 1"
    );
}

#[test]
fn clear_needs_one_selector_and_positive_floor() {
    assert_eq!(
        ui(&["clear", "--contains", "mail"]).unwrap(),
        UiAction::Clear {
            query: SelectorQuery::contains("mail"),
            min_backspaces: 72,
            from: None,
        }
    );
    assert_eq!(
        ui_err(&["clear"]),
        "ui clear requires exactly one selector: --index|--id|--label|--contains"
    );
    assert_eq!(ui_err(&["clear", "--id", "a", "--max-backspaces", "0"]), "--max-backspaces must be > 0");
}

// =========================================================================
// ui swipe / wait / button / flow
// =========================================================================

#[test]
fn swipe_arguments() {
    assert_eq!(
        ui(&["swipe", "up"]).unwrap(),
        UiAction::Swipe {
            direction: Direction::Up,
            query: None,
            distance: 220.0,
            from: None,
        }
    );
    let UiAction::Swipe { query, distance, .. } = ui(&["swipe", "left", "--index", "3", "--distance", "80"]).unwrap()
    else {
        panic!("expected swipe");
    };
    assert_eq!(query, Some(SelectorQuery::index(3)));
    assert_eq!(distance, 80.0);

    assert_eq!(ui_err(&["swipe", "up", "--index", "1", "--id", "a"]), "choose only one selector: --index|--id");
    assert_eq!(ui_err(&["swipe", "sideways"]), "direction must be up|down|left|right");
    assert_eq!(ui_err(&["swipe", "up", "--distance", "0"]), "--distance must be > 0");
    assert_eq!(ui_err(&["swipe", "down", "--distance=-40"]), "--distance must be > 0");
}

#[test]
fn wait_uses_configured_defaults() {
    let UiAction::Wait(cond) = ui(&["wait", "--has-text", "Welcome"]).unwrap() else {
        panic!("expected wait");
    };
    assert_eq!(cond.timeout, Duration::from_secs(20));
    assert_eq!(cond.interval, Duration::from_millis(700));

    let UiAction::Wait(cond) = ui(&["wait", "--interactive-min", "2", "--timeout", "3s", "--interval", "100ms"]).unwrap()
    else {
        panic!("expected wait");
    };
    assert_eq!(cond.interactive_min, Some(2));
    assert_eq!(cond.timeout, Duration::from_secs(3));

    assert_eq!(ui_err(&["wait"]), "ui wait requires --has-text and/or --interactive-min");
}

#[test]
fn button_and_flow_arguments() {
    assert_eq!(ui(&["button", "lock"]).unwrap(), UiAction::Button("lock".into()));
    assert_eq!(ui_err(&["button", " "]), "usage: simagent ui button HOME|LOCK|SIRI");

    assert_eq!(
        ui(&["flow", "run", "--file", "login.yaml"]).unwrap(),
        UiAction::Flow {
            file: PathBuf::from("login.yaml"),
            resume_from: 1,
        }
    );
    assert_eq!(
        ui_err(&["flow", "run", "--file", "login.yaml", "--resume-from", "0"]),
        "--resume-from must be >= 1"
    );
}

#[test]
fn ui_subcommands_parse_to_expected_variants() {
    let cli = parse(&["ui", "tap", "--", "-5", "10"]);
    match cli.command {
        Some(Commands::Ui {
            command: UiCommand::Tap { x, y, .. },
        }) => assert_eq!((x, y), (Some(-5.0), Some(10.0))),
        other => panic!("expected ui tap, got {:?}", other),
    }
}

// =========================================================================
// frame options
// =========================================================================

#[test]
fn frame_defaults() {
    let opts = frame_options(&frame_args(&[]), &default_settings()).unwrap();
    assert!(opts.screenshot && opts.ui);
    assert!(opts.normalize.interactive_only, "Frames keep interactive elements by default");
    assert_eq!(opts.format, ImageFormat::Png);
    assert_eq!(opts.normalize.order, OrderMode::Reading);
    assert_eq!(opts.stable_samples, 3);
}

#[test]
fn frame_flags() {
    let opts = frame_options(
        &frame_args(&[
            "--format", "jpg", "--order", "z", "--include-roles", "Button,Cell", "--interactive-only", "false",
            "--stable", "--stable-samples", "4", "--stable-interval", "50ms", "--out", "/tmp/f",
        ]),
        &default_settings(),
    )
    .unwrap();
    assert_eq!(opts.format, ImageFormat::Jpg);
    assert_eq!(opts.normalize.order, OrderMode::Z);
    assert!(opts.normalize.include_roles.contains("cell"));
    assert!(!opts.normalize.interactive_only);
    assert!(opts.stable);
    assert_eq!(opts.stable_samples, 4);
    assert_eq!(opts.stable_interval, Duration::from_millis(50));
    assert_eq!(opts.out_dir, Some(PathBuf::from("/tmp/f")));
}

#[test]
fn frame_flag_errors() {
    let settings = default_settings();
    let err = frame_options(&frame_args(&["--format", "gif"]), &settings).unwrap_err();
    assert_eq!(err.to_string(), "--format must be png|jpg");
    let err = frame_options(&frame_args(&["--order", "random"]), &settings).unwrap_err();
    assert_eq!(err.to_string(), "--order must be reading|z|stable");
    let err = frame_options(&frame_args(&["--stable", "--ui", "false"]), &settings).unwrap_err();
    assert_eq!(err.to_string(), "--stable requires --ui");
    let err = frame_options(&frame_args(&["--stable", "--stable-samples", "1"]), &settings).unwrap_err();
    assert_eq!(err.to_string(), "--stable-samples must be >= 2");
}

// =========================================================================
// Config file and settings
// =========================================================================

#[test]
fn config_load_missing_or_malformed_file() {
    let cfg = load_config(Some("/nonexistent/path/simagent.yaml"));
    assert!(cfg.timeout.is_none());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.yaml");
    std::fs::write(&path, "timeout: [not, a, string").unwrap();
    let cfg = load_config(path.to_str());
    assert!(cfg.timeout.is_none(), "Malformed YAML falls back to defaults");
}

#[test]
fn config_read_reports_malformed_yaml() {
    assert!(read_config("/nonexistent/path/simagent.yaml").unwrap().is_none());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.yaml");
    std::fs::write(&path, "timeout: [not, a, string").unwrap();

    let err = read_config(path.to_str().unwrap()).unwrap_err();
    assert_eq!(err.code(), "IO_ERROR");
    assert!(err.to_string().starts_with("invalid config file:"));
    assert!(err.details()["cause"].as_str().is_some_and(|c| !c.is_empty()), "Parser error is kept");

    let good = dir.path().join("good.yaml");
    std::fs::write(&good, "focus_retries: 3\n").unwrap();
    assert_eq!(read_config(good.to_str().unwrap()).unwrap().unwrap().focus_retries, Some(3));
}

#[test]
fn config_partial_yaml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("simagent.yaml");
    std::fs::write(
        &path,
        "timeout: 30s\nchunk_size: 8\nwait:\n  interval: 100ms\nstable:\n  samples: 5\nidb_path: /opt/bin/idb\n",
    )
    .unwrap();
    let cfg = load_config(path.to_str());
    assert_eq!(cfg.timeout.as_deref(), Some("30s"));
    assert_eq!(cfg.chunk_size, Some(8));
    assert_eq!(cfg.wait.interval.as_deref(), Some("100ms"));
    assert!(cfg.wait.timeout.is_none());
    assert_eq!(cfg.stable.samples, Some(5));

    let settings = build_settings(&parse(&[]), &cfg);
    assert_eq!(settings.timeout, Duration::from_secs(30));
    assert_eq!(settings.timing.chunk_size, 8);
    assert_eq!(settings.wait_interval, Duration::from_millis(100));
    assert_eq!(settings.wait_timeout, Duration::from_secs(20));
    assert_eq!(settings.stable_samples, 5);
    assert_eq!(settings.idb, "/opt/bin/idb");
    assert_eq!(settings.xcrun, "xcrun");
}

#[test]
fn settings_precedence_cli_over_config() {
    let cfg = AppConfig {
        timeout: Some("30s".into()),
        ..Default::default()
    };
    let settings = build_settings(&parse(&["--timeout", "2s"]), &cfg);
    assert_eq!(settings.timeout, Duration::from_secs(2));
}

#[test]
fn settings_ignore_zero_and_unparseable_values() {
    let defaults = default_settings();
    let cfg = AppConfig {
        timeout: Some("0s".into()),
        focus_retries: Some(0),
        chunk_size: Some(0),
        idb_path: Some("  ".into()),
        ..Default::default()
    };
    assert_eq!(build_settings(&parse(&[]), &cfg), defaults);

    let cfg = AppConfig {
        timeout: Some("whenever".into()),
        ..Default::default()
    };
    assert_eq!(build_settings(&parse(&[]), &cfg).timeout, defaults.timeout);
}

// =========================================================================
// Output envelopes
// =========================================================================

#[test]
fn success_envelope_merges_object_bodies() {
    let rendered = Rendered::new(&json!({ "action": "tap", "ok": false }), "tap").unwrap();
    assert_eq!(rendered.envelope(), json!({ "ok": true, "action": "tap" }));

    let list = Rendered::new(&vec!["a", "b"], "").unwrap();
    assert_eq!(list.envelope(), json!({ "ok": true, "result": ["a", "b"] }));

    let empty = Rendered::new(&(), "").unwrap();
    assert_eq!(empty.envelope(), json!({ "ok": true }));
}

#[test]
fn failure_envelope_carries_code_and_details() {
    let err = SimError::usage("bad flag");
    let json = serde_json::to_value(err.envelope()).unwrap();
    assert_eq!(json, json!({ "ok": false, "error": { "code": "USAGE", "message": "bad flag" } }));

    let failed = SimError::CommandFailed {
        program: "idb".into(),
        stdout: String::new(),
        stderr: "boom".into(),
        exit_code: Some(2),
    }
    .recode("IDB_UI_FAILED", "tap failed");
    let json = serde_json::to_value(failed.envelope()).unwrap();
    assert_eq!(json["error"]["code"], json!("IDB_UI_FAILED"));
    assert_eq!(json["error"]["message"], json!("tap failed"));
    assert_eq!(json["error"]["details"]["exitCode"], json!(2));
    assert_eq!(json["error"]["details"]["causeMessage"], json!("command failed: idb"));
}

#[test]
fn recode_keeps_matching_codes() {
    let err = SimError::NoLastFrame.recode("NO_LAST_FRAME", "ignored");
    assert!(matches!(err, SimError::NoLastFrame));
}
