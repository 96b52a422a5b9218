use std::path::PathBuf;

use thiserror::Error;

use crate::constants::{ANSIBLE_MISSING_RC, INVALID_CONFIG_RC, INVALID_PREREQUISITES_RC};
use crate::runner::CompletedProcess;

pub type Result<T> = std::result::Result<T, AnsibleCompatError>;

/// Errors raised by the compatibility layer.
///
/// Every variant maps to a process exit code through [`AnsibleCompatError::code`],
/// so front-ends can report failures the same way regardless of which
/// operation produced them.
#[derive(Debug, Error)]
pub enum AnsibleCompatError {
    /// Missing or broken Ansible installation.
    #[error("{msg}")]
    MissingAnsible {
        msg: String,
        proc: Option<Box<CompletedProcess>>,
    },

    /// A requirement (collection, role, requirements file) is not usable.
    #[error("{0}")]
    InvalidPrerequisite(String),

    /// An `ansible-*` command exited with a non-zero code.
    #[error("Got {rc} exit code while running: {cmd}", rc = .proc.returncode, cmd = .proc.command_line())]
    AnsibleCommand { proc: Box<CompletedProcess> },

    #[error("{0}")]
    InvalidConfig(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML from {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to parse JSON from {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl AnsibleCompatError {
    pub fn missing_ansible(msg: impl Into<String>) -> Self {
        AnsibleCompatError::MissingAnsible {
            msg: msg.into(),
            proc: None,
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        AnsibleCompatError::Io {
            context: context.into(),
            source,
        }
    }

    /// Exit code a command line front-end should use for this error.
    pub fn code(&self) -> i32 {
        match self {
            AnsibleCompatError::MissingAnsible { .. } => ANSIBLE_MISSING_RC,
            AnsibleCompatError::InvalidPrerequisite(_) => INVALID_PREREQUISITES_RC,
            AnsibleCompatError::InvalidConfig(_) => INVALID_CONFIG_RC,
            AnsibleCompatError::AnsibleCommand { .. }
            | AnsibleCompatError::Io { .. }
            | AnsibleCompatError::Yaml { .. }
            | AnsibleCompatError::Json { .. } => 1,
        }
    }

    /// The failed process attached to the error, if any.
    pub fn process(&self) -> Option<&CompletedProcess> {
        match self {
            AnsibleCompatError::MissingAnsible { proc, .. } => proc.as_deref(),
            AnsibleCompatError::AnsibleCommand { proc } => Some(proc),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(rc: i32) -> CompletedProcess {
        CompletedProcess {
            args: vec!["ansible-galaxy".into(), "role".into(), "install".into()],
            returncode: rc,
            stdout: String::new(),
            stderr: "boom".into(),
        }
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(AnsibleCompatError::missing_ansible("x").code(), ANSIBLE_MISSING_RC);
        assert_eq!(
            AnsibleCompatError::InvalidPrerequisite("x".into()).code(),
            INVALID_PREREQUISITES_RC
        );
        assert_eq!(AnsibleCompatError::InvalidConfig("x".into()).code(), INVALID_CONFIG_RC);
        let err = AnsibleCompatError::AnsibleCommand {
            proc: Box::new(failed(1)),
        };
        assert_eq!(err.code(), 1);
    }

    #[test]
    fn test_command_error_message() {
        let err = AnsibleCompatError::AnsibleCommand {
            proc: Box::new(failed(1)),
        };
        assert_eq!(
            err.to_string(),
            "Got 1 exit code while running: ansible-galaxy role install"
        );
        assert_eq!(err.process().map(|p| p.stderr.as_str()), Some("boom"));
    }

    #[test]
    fn test_missing_ansible_keeps_process() {
        let err = AnsibleCompatError::MissingAnsible {
            msg: "Unable to find a working copy of ansible executable.".into(),
            proc: Some(Box::new(failed(127))),
        };
        assert_eq!(err.process().map(|p| p.returncode), Some(127));
        assert!(err.to_string().starts_with("Unable to find"));
    }
}
