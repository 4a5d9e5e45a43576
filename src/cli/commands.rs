use std::path::PathBuf;

use serde_json::json;
use tracing::info;

use crate::automation::actions::{Automation, TapTarget, TypeRequest};
use crate::automation::outcome::{ActionOutcome, Direction};
use crate::cli::config::{
    AppCommand, AppConfig, Cli, Commands, FlowCommand, FrameArgs, RawCommand,
    Settings, TargetCommand, UiCommand, build_settings,
};
use crate::cli::output::Rendered;
use crate::device::Device;
use crate::device::command::CommandRunner;
use crate::device::idb::{IdbDevice, ensure_idb};
use crate::device::target::{SavedTarget, SimTarget, Simctl, select_target};
use crate::error::{Result, SimError};
use crate::flow::{FlowFile, FlowRunner};
use crate::frame::capture::{FrameOptions, capture_frame};
use crate::frame::store::FrameStore;
use crate::input::clear::DEFAULT_CLEAR_KEYS;
use crate::selector::SelectorQuery;
use crate::sync::wait::WaitCondition;
use crate::trace::TraceLogger;
use crate::tree::normalize::{NormalizeOptions, role_set};

/// Everything a command needs beyond its own arguments.
pub struct Session {
    pub settings: Settings,
    pub store: FrameStore,
    pub runner: CommandRunner,
    pub simctl: Simctl,
    pub trace: TraceLogger,
    pub target_spec: Option<String>,
}

impl Session {
    pub fn open(cli: &Cli, config: &AppConfig) -> Result<Session> {
        let settings = build_settings(cli, config);
        let runner = CommandRunner::new(settings.timeout);
        let simctl = Simctl::new(runner.clone(), settings.xcrun.clone());
        let trace = match &cli.trace {
            Some(path) => TraceLogger::new(path),
            None => TraceLogger::disabled(),
        };
        Ok(Session {
            store: FrameStore::open_default()?,
            settings,
            runner,
            simctl,
            trace,
            target_spec: cli.target.clone(),
        })
    }

    /// `--target`, else the saved default, else the booted simulator.
    pub fn target(&self) -> Result<SimTarget> {
        let default_udid = self.store.default_udid();
        self.simctl
            .resolve_target(self.target_spec.as_deref(), default_udid.as_deref())
    }

    /// Fails with `IDB_NOT_FOUND` when idb is not installed.
    pub fn device(&self, target: &SimTarget) -> Result<IdbDevice> {
        ensure_idb(&self.settings.idb)?;
        Ok(self.device_unchecked(target))
    }

    fn device_unchecked(&self, target: &SimTarget) -> IdbDevice {
        IdbDevice::new(
            self.runner.clone(),
            self.settings.idb.clone(),
            target.udid.clone(),
            self.simctl.clone(),
        )
    }
}

pub fn dispatch(command: &Commands, session: &Session) -> Result<Rendered> {
    match command {
        Commands::Target { command } => match command {
            TargetCommand::List => cmd_target_list(session),
            TargetCommand::Set { spec } => cmd_target_set(session, spec),
            TargetCommand::Show => cmd_target_show(session),
        },
        Commands::Frame(args) => cmd_frame(session, args),
        Commands::Ui { command } => cmd_ui(session, command),
        Commands::App { command } => cmd_app(session, command),
        Commands::Raw { command } => cmd_raw(session, command),
    }
}

// ============================================================================
// target subcommand
// ============================================================================

pub fn cmd_target_list(session: &Session) -> Result<Rendered> {
    let targets = session.simctl.list_targets()?;
    let text = targets
        .iter()
        .map(|t| format!("{}\t{}\t{}\t{}", t.name, t.udid, t.runtime, t.state))
        .collect::<Vec<_>>()
        .join("\n");
    Rendered::new(&json!({ "targets": targets }), text)
}

pub fn cmd_target_set(session: &Session, spec: &str) -> Result<Rendered> {
    let spec = spec.trim();
    if spec.is_empty() {
        return Err(SimError::usage("usage: simagent target set booted|<UDID>"));
    }
    let targets = session.simctl.list_targets()?;
    let target = select_target(&targets, Some(spec), None)?;

    let mut config = session.store.load_config()?;
    config.default_target = Some(SavedTarget::from(&target));
    session.store.save_config(&config)?;
    info!(udid = %target.udid, "default target saved");

    let text = format!("default target set: {} ({})", target.name, target.udid);
    Rendered::new(&json!({ "target": target }), text)
}

pub fn cmd_target_show(session: &Session) -> Result<Rendered> {
    let target = session
        .store
        .load_config()?
        .default_target
        .ok_or(SimError::NoDefaultTarget)?;
    let text = format!("{}\t{}\t{}\t{}", target.name, target.udid, target.runtime, target.state);
    Rendered::new(&json!({ "target": target }), text)
}

// ============================================================================
// frame subcommand
// ============================================================================

pub fn frame_options(args: &FrameArgs, settings: &Settings) -> Result<FrameOptions> {
    let opts = FrameOptions {
        out_dir: args.out.clone(),
        screenshot: args.screenshot,
        ui: args.ui,
        format: args.format.parse()?,
        stable: args.stable,
        stable_samples: args.stable_samples.unwrap_or(settings.stable_samples),
        stable_interval: args.stable_interval.unwrap_or(settings.stable_interval),
        normalize: NormalizeOptions {
            order: args.order.parse()?,
            min_area: args.min_area.max(0.0),
            include_roles: args.include_roles.as_deref().map(role_set).unwrap_or_default(),
            exclude_roles: args.exclude_roles.as_deref().map(role_set).unwrap_or_default(),
            interactive_only: args.interactive_only,
        },
    };
    opts.validate()?;
    Ok(opts)
}

pub fn cmd_frame(session: &Session, args: &FrameArgs) -> Result<Rendered> {
    let opts = frame_options(args, &session.settings)?;
    let target = session.target()?;
    // Screenshots only go through simctl.
    let device = if opts.ui {
        session.device(&target)?
    } else {
        session.device_unchecked(&target)
    };
    let result = capture_frame(&device, &target, &opts, &session.store)?;
    let text = format!(
        "{} ({} elements, {} interactive)",
        result.out_dir, result.counts.all, result.counts.interactive
    );
    Rendered::new(&result, text)
}

// ============================================================================
// ui subcommand
// ============================================================================

pub fn cmd_ui(session: &Session, command: &UiCommand) -> Result<Rendered> {
    // Argument errors surface before any device work.
    let action = ui_action(command, &session.settings)?;

    let target = session.target()?;
    let device = session.device(&target)?;
    let automation = Automation::new(&device, &session.store).with_timing(session.settings.timing.clone());
    execute_ui_action(session, &automation, &action)
}

/// A parsed `ui` command.
#[derive(Debug, Clone, PartialEq)]
pub enum UiAction {
    Tap {
        target: TapTarget,
        from: Option<PathBuf>,
    },
    Type {
        request: TypeRequest,
        from: Option<PathBuf>,
    },
    Clear {
        query: SelectorQuery,
        min_backspaces: usize,
        from: Option<PathBuf>,
    },
    Swipe {
        direction: Direction,
        query: Option<SelectorQuery>,
        distance: f64,
        from: Option<PathBuf>,
    },
    Wait(WaitCondition),
    Button(String),
    Flow {
        file: PathBuf,
        resume_from: usize,
    },
}

/// Check `ui` arguments and turn them into an action.
pub fn ui_action(command: &UiCommand, settings: &Settings) -> Result<UiAction> {
    match command {
        UiCommand::Tap {
            x,
            y,
            unit,
            selector,
            from,
        } => {
            let query = selector.query();
            let target = match (x, y) {
                (Some(x), Some(y)) if query.is_empty() => TapTarget::Point {
                    x: *x,
                    y: *y,
                    unit: unit.parse()?,
                },
                (None, None) if !query.is_empty() => {
                    query.selector()?;
                    TapTarget::Element(query)
                }
                _ => {
                    return Err(SimError::usage(
                        "usage: simagent ui tap <x> <y> [--unit pt|px] | --index <n> | --id <id> | --label <text> | --contains <text>",
                    ));
                }
            };
            Ok(UiAction::Tap {
                target,
                from: from.clone(),
            })
        }

        UiCommand::Type {
            text,
            words,
            into,
            selector,
            replace,
            ascii,
            paste,
            verify,
            focus_retries,
            from,
        } => {
            if text.is_some() && !words.is_empty() {
                return Err(SimError::usage("use either --text or positional text, not both"));
            }
            let text = text.clone().unwrap_or_else(|| words.join(" "));
            if text.trim().is_empty() {
                return Err(SimError::usage(
                    "usage: simagent ui type --text \"...\" [--into --index <n>|--id <id>|--label <text>|--contains <text>] [--replace] [--ascii|--paste] [--verify]",
                ));
            }
            let query = selector.query();
            if *replace && !*into {
                return Err(SimError::usage("--replace requires --into"));
            }
            if !*into && !query.is_empty() {
                return Err(SimError::usage("selector flags require --into"));
            }
            let request = TypeRequest {
                text,
                into: into.then_some(query),
                replace: *replace,
                ascii: *ascii,
                paste: *paste,
                verify: *verify,
                focus_retries: focus_retries.unwrap_or(settings.focus_retries),
            };
            request.validate()?;
            Ok(UiAction::Type {
                request,
                from: from.clone(),
            })
        }

        UiCommand::Clear {
            selector,
            max_backspaces,
            from,
        } => {
            if *max_backspaces == Some(0) {
                return Err(SimError::usage("--max-backspaces must be > 0"));
            }
            let query = selector.query();
            if query.count() != 1 {
                return Err(SimError::usage(
                    "ui clear requires exactly one selector: --index|--id|--label|--contains",
                ));
            }
            Ok(UiAction::Clear {
                query,
                min_backspaces: max_backspaces.unwrap_or(DEFAULT_CLEAR_KEYS),
                from: from.clone(),
            })
        }

        UiCommand::Swipe {
            direction,
            index,
            id,
            distance,
            from,
        } => {
            let query = SelectorQuery {
                index: *index,
                id: id.clone(),
                ..Default::default()
            };
            if query.count() > 1 {
                return Err(SimError::usage("choose only one selector: --index|--id"));
            }
            if !distance.is_finite() || *distance <= 0.0 {
                return Err(SimError::usage("--distance must be > 0"));
            }
            Ok(UiAction::Swipe {
                direction: direction.parse()?,
                query: (!query.is_empty()).then_some(query),
                distance: *distance,
                from: from.clone(),
            })
        }

        UiCommand::Wait {
            has_text,
            interactive_min,
            timeout,
            interval,
        } => {
            let cond = WaitCondition {
                has_text: has_text.clone(),
                interactive_min: *interactive_min,
                timeout: timeout.unwrap_or(settings.wait_timeout),
                interval: interval.unwrap_or(settings.wait_interval),
            };
            cond.validate()?;
            Ok(UiAction::Wait(cond))
        }

        UiCommand::Button { name } => {
            if name.trim().is_empty() {
                return Err(SimError::usage("usage: simagent ui button HOME|LOCK|SIRI"));
            }
            Ok(UiAction::Button(name.clone()))
        }

        UiCommand::Flow {
            command: FlowCommand::Run { file, resume_from },
        } => {
            if *resume_from == 0 {
                return Err(SimError::usage("--resume-from must be >= 1"));
            }
            Ok(UiAction::Flow {
                file: file.clone(),
                resume_from: *resume_from,
            })
        }
    }
}

fn execute_ui_action<D: Device + ?Sized>(
    session: &Session,
    automation: &Automation<'_, D>,
    action: &UiAction,
) -> Result<Rendered> {
    let (name, result) = match action {
        UiAction::Tap { target, from } => (
            "tap",
            automation.tap(target, from.as_deref()).map(ActionOutcome::Tap),
        ),
        UiAction::Type { request, from } => (
            "type",
            automation
                .type_text(request, from.as_deref())
                .map(ActionOutcome::Type),
        ),
        UiAction::Clear {
            query,
            min_backspaces,
            from,
        } => (
            "clear",
            automation
                .clear(query, from.as_deref(), Some(*min_backspaces))
                .map(ActionOutcome::Clear),
        ),
        UiAction::Swipe {
            direction,
            query,
            distance,
            from,
        } => (
            "swipe",
            automation
                .swipe(*direction, query.as_ref(), from.as_deref(), *distance)
                .map(ActionOutcome::Swipe),
        ),
        UiAction::Wait(cond) => ("wait", automation.wait(cond).map(ActionOutcome::Wait)),
        UiAction::Button(name) => ("button", automation.button(name).map(ActionOutcome::Button)),
        UiAction::Flow { file, resume_from } => {
            let flow = FlowFile::load(file)?;
            let report = FlowRunner::new(automation.clone())
                .with_trace(&session.trace)
                .run(&flow, &file.to_string_lossy(), *resume_from)?;
            let text = format!("flow completed: {} steps", report.steps.len());
            return Rendered::new(&report, text);
        }
    };

    session.trace.record(name, None, &result);
    let outcome = result?;
    Rendered::new(&outcome, outcome.summary())
}

// ============================================================================
// app subcommand
// ============================================================================

pub fn cmd_app(session: &Session, command: &AppCommand) -> Result<Rendered> {
    let target = session.target()?;
    let udid = target.udid.as_str();
    match command {
        AppCommand::Openurl { url } => {
            if url.trim().is_empty() {
                return Err(SimError::usage("usage: simagent app openurl \"<url>\""));
            }
            session.simctl.open_url(udid, url)?;
            Rendered::new(&json!({ "action": "openurl", "url": url }), format!("openurl {}", url))
        }
        AppCommand::Launch { bundle_id, args } => {
            if bundle_id.trim().is_empty() {
                return Err(SimError::usage("usage: simagent app launch --bundle-id <id> [--args ...]"));
            }
            session.simctl.launch(udid, bundle_id, args)?;
            Rendered::new(
                &json!({ "action": "launch", "bundleId": bundle_id, "args": args }),
                format!("launch {}", bundle_id),
            )
        }
        AppCommand::Terminate { bundle_id } => {
            if bundle_id.trim().is_empty() {
                return Err(SimError::usage("usage: simagent app terminate --bundle-id <id>"));
            }
            session.simctl.terminate(udid, bundle_id)?;
            Rendered::new(
                &json!({ "action": "terminate", "bundleId": bundle_id }),
                format!("terminate {}", bundle_id),
            )
        }
        AppCommand::List => {
            let apps = session.simctl.list_apps(udid)?;
            Rendered::new(&json!({ "apps": apps }), apps.trim_end())
        }
    }
}

// ============================================================================
// raw subcommand
// ============================================================================

pub fn cmd_raw(session: &Session, command: &RawCommand) -> Result<Rendered> {
    let (program, args) = match command {
        RawCommand::Simctl { args } if !args.is_empty() => {
            let mut full = vec!["simctl".to_string()];
            full.extend(args.iter().cloned());
            (session.settings.xcrun.as_str(), full)
        }
        RawCommand::Idb { args } if !args.is_empty() => (session.settings.idb.as_str(), args.clone()),
        _ => return Err(SimError::usage("usage: simagent raw simctl <...>|idb <...>")),
    };
    let out = session
        .runner
        .run(program, &args)
        .map_err(|e| e.recode("RAW_FAILED", "raw command failed"))?;
    if !out.stderr.trim().is_empty() {
        eprint!("{}", out.stderr);
    }
    Rendered::new(
        &json!({ "stdout": out.stdout, "stderr": out.stderr, "exitCode": out.exit_code }),
        out.stdout.trim_end(),
    )
}
