use std::io::{ErrorKind, Read};
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::debug;
use wait_timeout::ChildExt;

use crate::error::{Result, SimError};

pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

/// Runs one blocking subprocess per call, bounded by a fixed timeout.
///
/// An expired timeout kills the child and reports `TIMEOUT`; nothing is
/// retried at this layer.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    timeout: Duration,
}

impl Default for CommandRunner {
    fn default() -> Self {
        CommandRunner::new(DEFAULT_COMMAND_TIMEOUT)
    }
}

impl CommandRunner {
    pub fn new(timeout: Duration) -> Self {
        CommandRunner { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        debug!(program, args = %args.join(" "), "running command");

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == ErrorKind::NotFound {
                    SimError::CommandNotFound(program.to_string())
                } else {
                    SimError::wrap("COMMAND_FAILED", format!("failed to run: {}", program), e)
                }
            })?;

        // Pipes are drained on their own threads so a chatty child cannot
        // block on a full pipe while we wait on it.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = match child.wait_timeout(self.timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(SimError::Timeout {
                    command: format!("{} {}", program, args.join(" ")),
                    stderr: collect(stderr),
                });
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(SimError::wrap(
                    "COMMAND_FAILED",
                    format!("failed to run: {}", program),
                    e,
                ));
            }
        };

        let output = CommandOutput {
            stdout: collect(stdout),
            stderr: collect(stderr),
            exit_code: status.code().unwrap_or(-1),
        };

        if !status.success() {
            return Err(SimError::CommandFailed {
                program: program.to_string(),
                stdout: output.stdout,
                stderr: output.stderr,
                exit_code: status.code(),
            });
        }
        Ok(output)
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<String>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).into_owned()
        })
    })
}

fn collect(handle: Option<JoinHandle<String>>) -> String {
    handle
        .map(|h| h.join().unwrap_or_default())
        .unwrap_or_default()
}

/// Coordinates are sent to idb as whole points.
pub fn coord_arg(v: f64) -> String {
    format!("{}", v.round() as i64)
}
