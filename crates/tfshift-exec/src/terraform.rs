//! terraform CLI wrapper
//!
//! Wraps the terraform commands tfshift needs. State documents held in memory
//! are written to scratch files and addressed with `-state` / `-state-out`,
//! which is why every state command runs against a local backend override.

use crate::cancel::CancelToken;
use crate::cli::{MvOutcome, PlanOptions, PlanOutcome, TerraformCli};
use crate::error::{ExecError, Result};
use crate::executor::Executor;
use crate::state::{Plan, State, StateRef};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::fs;

pub const DEFAULT_WORKSPACE: &str = "default";

/// File written into the working directory to force a local backend
pub const OVERRIDE_FILE_NAME: &str = "_tfshift_override.tf";

const OVERRIDE_CONTENTS: &str = r#"terraform {
  backend "local" {
  }
}
"#;

/// terraform CLI client for one working directory
pub struct Terraform {
    executor: Executor,
}

impl Terraform {
    /// Create a client; an empty `dir` means the current directory
    pub fn new(dir: impl AsRef<Path>, exec_path: &str) -> Result<Self> {
        let dir = dir.as_ref();
        let dir = if dir.as_os_str().is_empty() {
            Path::new(".")
        } else {
            dir
        };

        let executor = Executor::new(exec_path, dir)?.with_env("TF_IN_AUTOMATION", "1");
        Ok(Self { executor })
    }

    fn override_path(&self) -> PathBuf {
        self.executor.dir().join(OVERRIDE_FILE_NAME)
    }

    async fn run(&self, args: Vec<String>, cancel: &CancelToken) -> Result<String> {
        self.executor.run_checked(&args, cancel).await
    }
}

fn to_args(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

/// A state document materialised on disk for one command
enum ScratchState {
    /// Copy of an in-memory state; read back after the command
    Temp(NamedTempFile),
    /// Caller-owned file, mutated in place
    External(PathBuf),
}

impl ScratchState {
    async fn create(doc: StateRef<'_>) -> Result<Self> {
        match doc {
            StateRef::Memory(state) => Self::from_state(state).await,
            StateRef::File(path) => Ok(ScratchState::External(path.to_path_buf())),
        }
    }

    async fn from_state(state: &State) -> Result<Self> {
        let file = tempfile::Builder::new()
            .prefix("tfshift-")
            .suffix(".tfstate")
            .tempfile()?;
        fs::write(file.path(), state.bytes()).await?;
        Ok(ScratchState::Temp(file))
    }

    fn path(&self) -> &Path {
        match self {
            ScratchState::Temp(file) => file.path(),
            ScratchState::External(path) => path,
        }
    }

    fn flag(&self, name: &str) -> String {
        format!("-{}={}", name, self.path().display())
    }

    async fn read_back(&self) -> Result<Option<State>> {
        match self {
            ScratchState::Temp(file) => Ok(Some(State::new(fs::read(file.path()).await?))),
            ScratchState::External(_) => Ok(None),
        }
    }
}

#[async_trait]
impl TerraformCli for Terraform {
    fn dir(&self) -> &Path {
        self.executor.dir()
    }

    async fn init(&self, args: &[String], cancel: &CancelToken) -> Result<()> {
        let mut full = to_args(&["init"]);
        full.extend_from_slice(args);
        self.run(full, cancel).await?;
        Ok(())
    }

    async fn workspace_show(&self, cancel: &CancelToken) -> Result<String> {
        let output = self.run(to_args(&["workspace", "show"]), cancel).await?;
        Ok(output.trim().to_string())
    }

    async fn workspace_select(&self, workspace: &str, cancel: &CancelToken) -> Result<()> {
        self.run(to_args(&["workspace", "select", workspace]), cancel)
            .await?;
        Ok(())
    }

    async fn workspace_new(&self, workspace: &str, cancel: &CancelToken) -> Result<()> {
        self.run(to_args(&["workspace", "new", workspace]), cancel)
            .await?;
        Ok(())
    }

    async fn state_pull(&self, cancel: &CancelToken) -> Result<State> {
        let stdout = self
            .executor
            .run_checked_raw(&to_args(&["state", "pull"]), cancel)
            .await?;
        Ok(State::new(stdout))
    }

    async fn state_push(&self, state: &State, force: bool, cancel: &CancelToken) -> Result<()> {
        let scratch = ScratchState::from_state(state).await?;

        let mut args = to_args(&["state", "push"]);
        if force {
            args.push("-force".to_string());
        }
        args.push(scratch.path().display().to_string());

        self.run(args, cancel).await?;
        Ok(())
    }

    async fn state_mv(
        &self,
        from: StateRef<'_>,
        to: Option<StateRef<'_>>,
        source: &str,
        destination: &str,
        cancel: &CancelToken,
    ) -> Result<MvOutcome> {
        let from_scratch = ScratchState::create(from).await?;
        let mut args = to_args(&["state", "mv", "-backup=/dev/null"]);
        args.push(from_scratch.flag("state"));

        let to_scratch = match to {
            Some(doc) => {
                let scratch = ScratchState::create(doc).await?;
                args.push("-backup-out=/dev/null".to_string());
                args.push(scratch.flag("state-out"));
                Some(scratch)
            }
            None => None,
        };

        args.push(source.to_string());
        args.push(destination.to_string());
        self.run(args, cancel).await?;

        let to_state = match &to_scratch {
            Some(scratch) => scratch.read_back().await?,
            None => None,
        };
        Ok(MvOutcome {
            from: from_scratch.read_back().await?,
            to: to_state,
        })
    }

    async fn state_rm(
        &self,
        state: &State,
        addresses: &[String],
        cancel: &CancelToken,
    ) -> Result<State> {
        let scratch = ScratchState::from_state(state).await?;

        let mut args = to_args(&["state", "rm", "-backup=/dev/null"]);
        args.push(scratch.flag("state"));
        args.extend_from_slice(addresses);
        self.run(args, cancel).await?;

        read_back_required(&scratch, "state rm").await
    }

    async fn import(
        &self,
        state: &State,
        address: &str,
        id: &str,
        cancel: &CancelToken,
    ) -> Result<State> {
        let scratch = ScratchState::from_state(state).await?;

        let mut args = to_args(&["import", "-input=false", "-no-color", "-backup=/dev/null"]);
        args.push(scratch.flag("state"));
        args.push(address.to_string());
        args.push(id.to_string());
        self.run(args, cancel).await?;

        read_back_required(&scratch, "import").await
    }

    async fn state_list(
        &self,
        state: Option<&State>,
        addresses: &[String],
        cancel: &CancelToken,
    ) -> Result<Vec<String>> {
        let mut args = to_args(&["state", "list"]);
        let scratch = match state {
            Some(state) => Some(ScratchState::from_state(state).await?),
            None => None,
        };
        if let Some(scratch) = &scratch {
            args.push(scratch.flag("state"));
        }
        args.extend_from_slice(addresses);

        let output = self.run(args, cancel).await?;
        Ok(output
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn plan(
        &self,
        state: Option<&State>,
        options: &PlanOptions,
        cancel: &CancelToken,
    ) -> Result<PlanOutcome> {
        let plan_file = tempfile::Builder::new()
            .prefix("tfshift-")
            .suffix(".tfplan")
            .tempfile()?;

        let mut args = to_args(&["plan", "-input=false", "-no-color", "-detailed-exitcode"]);
        args.push(format!("-out={}", plan_file.path().display()));

        let scratch = match state {
            Some(state) => Some(ScratchState::from_state(state).await?),
            None => None,
        };
        if let Some(scratch) = &scratch {
            args.push(scratch.flag("state"));
        }
        if let Some(target) = &options.target {
            args.push(format!("-target={}", target));
        }
        args.extend(options.args.iter().cloned());

        // -detailed-exitcode: 0 = no changes, 2 = changes present
        let output = self.executor.run(&args, cancel).await?;
        let has_change = match output.code {
            Some(0) => false,
            Some(2) => true,
            _ => return Err(self.executor.failure(&args, output)),
        };

        let plan = if options.save {
            Some(Plan::new(fs::read(plan_file.path()).await?))
        } else {
            None
        };
        Ok(PlanOutcome { has_change, plan })
    }

    async fn apply(&self, plan: &Plan, cancel: &CancelToken) -> Result<()> {
        let plan_file = tempfile::Builder::new()
            .prefix("tfshift-")
            .suffix(".tfplan")
            .tempfile()?;
        fs::write(plan_file.path(), plan.bytes()).await?;

        let mut args = to_args(&["apply", "-input=false", "-no-color"]);
        args.push(plan_file.path().display().to_string());
        self.run(args, cancel).await?;
        Ok(())
    }

    async fn override_backend_to_local(
        &self,
        workspace: &str,
        cancel: &CancelToken,
    ) -> Result<()> {
        let path = self.override_path();
        tracing::info!("Overriding backend to local in {}", self.dir().display());
        fs::write(&path, OVERRIDE_CONTENTS).await?;

        let reconfigure = to_args(&["-input=false", "-no-color", "-reconfigure"]);
        if let Err(e) = self.init(&reconfigure, cancel).await {
            let _ = fs::remove_file(&path).await;
            return Err(e);
        }

        // A fresh local backend only knows the default workspace.
        if workspace != DEFAULT_WORKSPACE {
            self.workspace_new(workspace, cancel).await?;
        }
        Ok(())
    }

    async fn switch_back_to_remote(&self, workspace: &str, cancel: &CancelToken) -> Result<()> {
        tracing::info!("Switching {} back to remote", self.dir().display());
        match fs::remove_file(self.override_path()).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(ExecError::Io(e)),
        }

        if workspace != DEFAULT_WORKSPACE {
            let local = self.dir().join("terraform.tfstate.d").join(workspace);
            match fs::remove_dir_all(&local).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(ExecError::Io(e)),
            }
        }

        self.init(&to_args(&["-input=false", "-no-color", "-reconfigure"]), cancel)
            .await
    }
}

async fn read_back_required(scratch: &ScratchState, command: &str) -> Result<State> {
    scratch
        .read_back()
        .await?
        .ok_or_else(|| ExecError::MissingOutput(command.to_string()))
}
