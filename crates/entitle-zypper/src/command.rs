use std::process::Command;

use entitle_core::{Error, Result};
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn success(stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: Vec::new(),
        }
    }

    pub fn exit(exit_code: i32) -> Self {
        Self {
            exit_code,
            ..Self::default()
        }
    }
}

/// Runs local tools. Implemented by closures so callers can inject fakes.
pub trait CommandRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput>;
}

impl<F> CommandRunner for F
where
    F: Fn(&str, &[String]) -> Result<CommandOutput>,
{
    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        self(program, args)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        let output = Command::new(program)
            .args(args)
            .env("LC_ALL", "C")
            .output()
            .map_err(|err| Error::io(format!("failed to start {program}"), err))?;
        Ok(CommandOutput {
            // Terminated by a signal.
            exit_code: output.status.code().unwrap_or(-1),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

pub(crate) fn run_checked<R: CommandRunner + ?Sized>(
    runner: &R,
    program: &str,
    args: &[String],
    valid_exit_codes: &[i32],
) -> Result<Vec<u8>> {
    let command = command_line(program, args);
    debug!(command = %command, "executing");

    let output = runner.run(program, args)?;
    if valid_exit_codes.contains(&output.exit_code) {
        return Ok(output.stdout);
    }

    let captured = if output.stderr.iter().all(u8::is_ascii_whitespace) {
        &output.stdout
    } else {
        &output.stderr
    };
    Err(Error::Command {
        command,
        exit_code: output.exit_code,
        output: String::from_utf8_lossy(captured).trim().to_string(),
    })
}

pub(crate) fn command_line(program: &str, args: &[String]) -> String {
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}
