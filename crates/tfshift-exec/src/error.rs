//! Terraform CLI error types

use thiserror::Error;

/// Errors returned by the Terraform CLI client
///
/// Diagnostics printed by terraform are kept verbatim in `stderr`.
#[derive(Error, Debug)]
pub enum ExecError {
    #[error("`{command}` exited with {}:\n{stderr}", exit_status(.code))]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("exec path is empty")]
    EmptyExecPath,

    #[error("`{0}` was cancelled")]
    Cancelled(String),

    #[error("no object matches `{0}` in the state")]
    NoMatch(String),

    #[error("`{0}` did not produce the expected state output")]
    MissingOutput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExecError {
    /// Raw diagnostic text of a failed command, if any
    pub fn stderr(&self) -> Option<&str> {
        match self {
            ExecError::CommandFailed { stderr, .. } => Some(stderr),
            _ => None,
        }
    }

    /// Exit code of a failed command, if it exited normally
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            ExecError::CommandFailed { code, .. } => *code,
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExecError::Cancelled(_))
    }
}

fn exit_status(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "a signal".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, ExecError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_failed_keeps_diagnostic() {
        let err = ExecError::CommandFailed {
            command: "terraform state mv a b".to_string(),
            code: Some(1),
            stderr: "Error: Invalid source address".to_string(),
        };

        let message = err.to_string();
        assert!(message.contains("terraform state mv a b"));
        assert!(message.contains("exit code 1"));
        assert!(message.contains("Error: Invalid source address"));
        assert_eq!(err.stderr(), Some("Error: Invalid source address"));
        assert_eq!(err.exit_code(), Some(1));
    }

    #[test]
    fn test_killed_command_has_no_exit_code() {
        let err = ExecError::CommandFailed {
            command: "terraform plan".to_string(),
            code: None,
            stderr: String::new(),
        };

        assert!(err.to_string().contains("a signal"));
        assert_eq!(err.exit_code(), None);
        assert!(!err.is_cancelled());
    }
}
