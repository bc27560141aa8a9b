//! Subprocess runner for terraform commands

use crate::cancel::CancelToken;
use crate::error::{ExecError, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Runs commands in one working directory
///
/// The exec path may carry a wrapper, e.g. `direnv exec . terraform`; it is
/// split on whitespace and the remaining words are prepended to every call.
#[derive(Debug, Clone)]
pub struct Executor {
    program: String,
    base_args: Vec<String>,
    dir: PathBuf,
    env: Vec<(String, String)>,
}

/// Captured output of a finished command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub code: Option<i32>,
    /// Raw bytes; `state pull` output must reach the caller unchanged
    pub stdout: Vec<u8>,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl Executor {
    pub fn new(exec_path: &str, dir: impl AsRef<Path>) -> Result<Self> {
        let mut words = exec_path.split_whitespace().map(str::to_string);
        let program = words.next().ok_or(ExecError::EmptyExecPath)?;

        Ok(Self {
            program,
            base_args: words.collect(),
            dir: dir.as_ref().to_path_buf(),
            env: Vec::new(),
        })
    }

    /// Set an environment variable for every command
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The full command line for `args`, used in logs and errors
    pub fn command_line(&self, args: &[String]) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.base_args.iter().map(String::as_str))
            .chain(args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run a command and return its output regardless of the exit code
    pub async fn run(&self, args: &[String], cancel: &CancelToken) -> Result<CommandOutput> {
        let command_line = self.command_line(args);
        if cancel.is_cancelled() {
            return Err(ExecError::Cancelled(command_line));
        }

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.base_args);
        cmd.args(args);
        cmd.current_dir(&self.dir);
        cmd.envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        tracing::debug!("Running: {} (in {})", command_line, self.dir.display());

        let output = tokio::select! {
            output = cmd.output() => output?,
            () = cancel.cancelled() => {
                tracing::debug!("Cancelled: {}", command_line);
                return Err(ExecError::Cancelled(command_line));
            }
        };

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: output.stdout,
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    /// Run a command and return stdout, failing on a non-zero exit code
    pub async fn run_checked(&self, args: &[String], cancel: &CancelToken) -> Result<String> {
        let stdout = self.run_checked_raw(args, cancel).await?;
        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }

    /// Like [`Executor::run_checked`], keeping stdout byte for byte
    pub async fn run_checked_raw(&self, args: &[String], cancel: &CancelToken) -> Result<Vec<u8>> {
        let output = self.run(args, cancel).await?;
        if !output.success() {
            return Err(self.failure(args, output));
        }
        Ok(output.stdout)
    }

    /// Build the error for a command that exited unsuccessfully
    pub fn failure(&self, args: &[String], output: CommandOutput) -> ExecError {
        ExecError::CommandFailed {
            command: self.command_line(args),
            code: output.code,
            stderr: output.stderr,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn args(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_exec_path_with_wrapper() {
        let executor = Executor::new("direnv exec . terraform", "/tmp").unwrap();
        assert_eq!(
            executor.command_line(&args(&["state", "pull"])),
            "direnv exec . terraform state pull"
        );
    }

    #[test]
    fn test_empty_exec_path() {
        assert!(matches!(
            Executor::new("   ", "."),
            Err(ExecError::EmptyExecPath)
        ));
    }

    #[tokio::test]
    async fn test_run_checked_returns_stdout() {
        let executor = Executor::new("echo", ".").unwrap();
        let stdout = executor
            .run_checked(&args(&["state", "list"]), &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(stdout.trim(), "state list");
    }

    #[tokio::test]
    async fn test_run_checked_raw_keeps_invalid_utf8() {
        let executor = Executor::new("sh -c", ".").unwrap();
        let stdout = executor
            .run_checked_raw(&args(&["printf '{\\377\\376}'"]), &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(stdout, vec![b'{', 0xff, 0xfe, b'}']);

        // text output replaces what is not UTF-8
        let text = executor
            .run_checked(&args(&["printf 'a\\377'"]), &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(text, "a\u{fffd}");
    }

    #[tokio::test]
    async fn test_run_checked_wraps_stderr() {
        let executor = Executor::new("sh -c", ".").unwrap();
        let err = executor
            .run_checked(
                &args(&["echo 'Error: Invalid source address' >&2; exit 1"]),
                &CancelToken::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.exit_code(), Some(1));
        assert!(err.stderr().unwrap().contains("Invalid source address"));
    }

    #[tokio::test]
    async fn test_run_keeps_non_zero_exit_code() {
        let executor = Executor::new("sh -c", ".").unwrap();
        let output = executor
            .run(&args(&["exit 2"]), &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(output.code, Some(2));
        assert!(!output.success());
    }

    #[tokio::test]
    async fn test_env_is_passed() {
        let executor = Executor::new("sh -c", ".")
            .unwrap()
            .with_env("TF_IN_AUTOMATION", "1");
        let stdout = executor
            .run_checked(&args(&["echo $TF_IN_AUTOMATION"]), &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(stdout.trim(), "1");
    }

    #[tokio::test]
    async fn test_cancelled_before_spawn() {
        let executor = Executor::new("echo", ".").unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();

        let err = executor
            .run(&args(&["state", "pull"]), &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_kills_running_command() {
        let executor = Executor::new("sleep", ".").unwrap();
        let cancel = CancelToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let err = executor.run(&args(&["10"]), &cancel).await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
