//! Subprocess plumbing used by the runtime to talk to the `ansible*` tools.

use std::io::ErrorKind;
use std::process::Command;

use itertools::Itertools;
use log::debug;
#[cfg(test)]
use mockall::automock;

use crate::errors::{AnsibleCompatError, Result};

/// Exit code reported when the executable itself cannot be found.
pub const COMMAND_NOT_FOUND_RC: i32 = 127;

/// Outcome of a finished command, mirroring what a shell would report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletedProcess {
    pub args: Vec<String>,
    pub returncode: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CompletedProcess {
    pub fn success(&self) -> bool {
        self.returncode == 0
    }

    /// Arguments joined with spaces, as used in log lines and error messages.
    pub fn command_line(&self) -> String {
        self.args.iter().join(" ")
    }
}

/// Executes commands on behalf of the runtime.
#[cfg_attr(test, automock)]
pub trait CommandRunner {
    /// Run `args[0]` with the remaining arguments and capture its output.
    ///
    /// A non-zero exit status is not an error; only a failure to spawn the
    /// process for reasons other than a missing executable is.
    fn run(&self, args: &[String]) -> Result<CompletedProcess>;
}

/// Runs commands as child processes inheriting the current environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
    fn run(&self, args: &[String]) -> Result<CompletedProcess> {
        let Some((program, rest)) = args.split_first() else {
            return Err(AnsibleCompatError::InvalidPrerequisite(
                "Unable to execute an empty command".to_string(),
            ));
        };

        debug!("Executing local command: {}", args.iter().join(" "));

        let output = match Command::new(program).args(rest).output() {
            Ok(output) => output,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Executable {} not found", program);
                return Ok(CompletedProcess {
                    args: args.to_vec(),
                    returncode: COMMAND_NOT_FOUND_RC,
                    stdout: String::new(),
                    stderr: format!("{}: command not found", program),
                });
            }
            Err(e) => {
                return Err(AnsibleCompatError::io(
                    format!("Failed to execute command: {}", program),
                    e,
                ))
            }
        };

        Ok(CompletedProcess {
            args: args.to_vec(),
            // Killed by a signal: no code, report a generic failure.
            returncode: output.status.code().unwrap_or(1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// Convenience for building argument vectors from string literals.
pub fn to_args<I, S>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    args.into_iter().map(Into::into).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(unix)]
    fn test_process_runner_echo() {
        let proc = ProcessRunner.run(&to_args(["echo", "hello"])).unwrap();
        assert_eq!(proc.returncode, 0);
        assert_eq!(proc.stdout.trim(), "hello");
        assert!(proc.stderr.is_empty());
        assert!(proc.success());
    }

    #[test]
    #[cfg(unix)]
    fn test_process_runner_nonzero_is_not_an_error() {
        let proc = ProcessRunner.run(&to_args(["sh", "-c", "echo oops >&2; exit 3"])).unwrap();
        assert_eq!(proc.returncode, 3);
        assert_eq!(proc.stderr.trim(), "oops");
        assert!(!proc.success());
    }

    #[test]
    fn test_process_runner_missing_executable() {
        let proc = ProcessRunner
            .run(&to_args(["this-command-does-not-exist-anywhere"]))
            .unwrap();
        assert_eq!(proc.returncode, COMMAND_NOT_FOUND_RC);
        assert!(proc.stderr.contains("command not found"));
    }

    #[test]
    fn test_process_runner_empty_command() {
        assert!(ProcessRunner.run(&[]).is_err());
    }

    #[test]
    fn test_command_line() {
        let proc = CompletedProcess {
            args: to_args(["ansible", "--version"]),
            ..Default::default()
        };
        assert_eq!(proc.command_line(), "ansible --version");
    }
}
