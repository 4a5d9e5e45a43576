use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use clap::error::ErrorKind;
use tracing_subscriber::EnvFilter;

use simagent::cli::commands::{Session, dispatch};
use simagent::cli::config::{Cli, load_config};
use simagent::cli::output::{print_failure, print_success};
use simagent::error::SimError;

const LOG_ENV: &str = "SIMAGENT_LOG";

fn init_logging(verbose: u8, quiet: bool) {
    let default_level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    };
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                let _ = e.print();
                return ExitCode::SUCCESS;
            }
            _ => {
                let json = std::env::args().any(|a| a == "--json");
                let message = e.render().to_string();
                let first_line = message.lines().next().unwrap_or_default().trim_start_matches("error: ");
                print_failure(&SimError::usage(first_line), json);
                return ExitCode::FAILURE;
            }
        },
    };
    init_logging(cli.verbose, cli.quiet);

    let Some(command) = &cli.command else {
        eprintln!("{}", Cli::command().render_help());
        return ExitCode::from(2);
    };

    let config = load_config(cli.config.as_deref());
    let result = Session::open(&cli, &config).and_then(|session| dispatch(command, &session));
    match result {
        Ok(rendered) => {
            print_success(&rendered, cli.json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            print_failure(&e, cli.json);
            ExitCode::FAILURE
        }
    }
}
