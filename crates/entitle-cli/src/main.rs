mod cli;
mod completion;
mod dispatch;
mod render;

use std::process::ExitCode;

use clap::Parser;
use entitle_engine::MigrationFailure;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::dispatch::run_cli;
use crate::render::{current_output_style, render_status_line, OutputStyle};

const LOG_ENV: &str = "ENTITLE_LOG";
const EXIT_FAILURE: u8 = 1;
const EXIT_FILESYSTEM_INCONSISTENT: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(log_level(cli.debug, cli.quiet));

    match run_cli(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            debug!("command failed: {err:?}");
            eprintln!("{}", failure_line(current_output_style(), &err));
            ExitCode::from(exit_code_for(&err))
        }
    }
}

pub(crate) fn log_level(debug: bool, quiet: bool) -> &'static str {
    if debug {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    }
}

fn init_tracing(level: &str) {
    let env_filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}

pub(crate) fn failure_line(style: OutputStyle, err: &anyhow::Error) -> String {
    render_status_line(style, "error", &format!("{err:#}"))
}

pub(crate) fn exit_code_for(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<MigrationFailure>() {
        Some(failure) if failure.filesystem_inconsistent => EXIT_FILESYSTEM_INCONSISTENT,
        _ => EXIT_FAILURE,
    }
}
