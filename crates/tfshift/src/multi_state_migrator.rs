//! Cross-directory migrator

use crate::error::{MigrateError, Phase, Result, merge_restore};
use crate::migrator::{MigrationStatus, Migrator};
use crate::multi_action::MultiStateAction;
use crate::option::MigratorOption;
use crate::workdir;
use async_trait::async_trait;
use std::path::Path;
use tfshift_exec::{CancelToken, DEFAULT_WORKSPACE, ExecError, State, TerraformCli};

/// Moves resources from the state of one directory to another
///
/// Both states are pulled, threaded through every action and verified
/// against their own configuration. On `apply` the "to" side is pushed
/// first: if the "from" push then fails the resource is tracked twice
/// rather than lost, and the run reports [`MigrateError::PartialApply`].
pub struct MultiStateMigrator<T: TerraformCli> {
    from_tf: T,
    to_tf: T,
    from_workspace: String,
    to_workspace: String,
    actions: Vec<MultiStateAction>,
    option: MigratorOption,
    force: bool,
    from_skip_plan: bool,
    to_skip_plan: bool,
    status: MigrationStatus,
}

impl<T: TerraformCli> MultiStateMigrator<T> {
    pub fn new(
        from_tf: T,
        to_tf: T,
        actions: Vec<MultiStateAction>,
        option: MigratorOption,
    ) -> Self {
        Self {
            from_tf,
            to_tf,
            from_workspace: DEFAULT_WORKSPACE.to_string(),
            to_workspace: DEFAULT_WORKSPACE.to_string(),
            actions,
            option,
            force: false,
            from_skip_plan: false,
            to_skip_plan: false,
            status: MigrationStatus::default(),
        }
    }

    /// Empty names mean `default`
    pub fn with_workspaces(mut self, from: &str, to: &str) -> Self {
        self.from_workspace = workdir::workspace_or_default(from);
        self.to_workspace = workdir::workspace_or_default(to);
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_skip_plan(mut self, from: bool, to: bool) -> Self {
        self.from_skip_plan = from;
        self.to_skip_plan = to;
        self
    }

    pub fn from_terraform(&self) -> &T {
        &self.from_tf
    }

    pub fn to_terraform(&self) -> &T {
        &self.to_tf
    }

    pub fn actions(&self) -> &[MultiStateAction] {
        &self.actions
    }

    async fn run(&self, commit: bool, cancel: &CancelToken) -> Result<()> {
        let from_dir = self.from_tf.dir();
        let to_dir = self.to_tf.dir();
        tracing::info!(
            "Migrating {} -> {} ({} actions)",
            from_dir.display(),
            to_dir.display(),
            self.actions.len()
        );

        let from_state = workdir::setup(&self.from_tf, &self.from_workspace, cancel).await?;
        let to_state = match workdir::setup(&self.to_tf, &self.to_workspace, cancel).await {
            Ok(state) => state,
            Err(e) => {
                let restored = workdir::switch_back(&self.from_tf, &self.from_workspace).await;
                return merge_restore(Err(e), restored, from_dir);
            }
        };

        let result = self.transform_and_verify(from_state, to_state, cancel).await;
        let restored_to = workdir::switch_back(&self.to_tf, &self.to_workspace).await;
        let restored_from = workdir::switch_back(&self.from_tf, &self.from_workspace).await;
        let result = merge_restore(result, restored_to, to_dir);
        let (new_from, new_to) = merge_restore(result, restored_from, from_dir)?;

        if !commit {
            tracing::info!(
                "Planned migration of {} -> {}",
                from_dir.display(),
                to_dir.display()
            );
            return Ok(());
        }

        workdir::push(&self.to_tf, &new_to, cancel).await?;
        // "to" is committed; the second push must not be cancelled.
        if let Err(e) = workdir::push(&self.from_tf, &new_from, &CancelToken::new()).await {
            tracing::error!(
                "{} was committed but pushing {} failed",
                to_dir.display(),
                from_dir.display()
            );
            return Err(MigrateError::PartialApply {
                committed: to_dir.to_path_buf(),
                uncommitted: from_dir.to_path_buf(),
                source: Box::new(e),
            });
        }

        tracing::info!(
            "Applied migration of {} -> {}",
            from_dir.display(),
            to_dir.display()
        );
        Ok(())
    }

    async fn transform_and_verify(
        &self,
        from: State,
        to: State,
        cancel: &CancelToken,
    ) -> Result<(State, State)> {
        let (from, to) = if self.from_skip_plan && self.to_skip_plan {
            self.transform_files(from, to, cancel).await?
        } else {
            self.transform(from, to, cancel).await?
        };

        if self.from_skip_plan {
            tracing::info!("Skipping plan check in {}", self.from_tf.dir().display());
        } else {
            workdir::verify(&self.from_tf, &from, &self.option, self.force, cancel).await?;
        }
        if self.to_skip_plan {
            tracing::info!("Skipping plan check in {}", self.to_tf.dir().display());
        } else {
            workdir::verify(&self.to_tf, &to, &self.option, self.force, cancel).await?;
        }
        Ok((from, to))
    }

    async fn transform(
        &self,
        mut from: State,
        mut to: State,
        cancel: &CancelToken,
    ) -> Result<(State, State)> {
        for action in &self.actions {
            (from, to) = action
                .apply(&self.from_tf, &self.to_tf, &from, &to, cancel)
                .await?;
        }
        Ok((from, to))
    }

    /// Thread both states through the actions as files in a scratch dir
    async fn transform_files(
        &self,
        from: State,
        to: State,
        cancel: &CancelToken,
    ) -> Result<(State, State)> {
        let dir = self.from_tf.dir();
        let scratch = tempfile::tempdir().map_err(|e| io_error(dir, e))?;
        let from_file = scratch.path().join("from.tfstate");
        let to_file = scratch.path().join("to.tfstate");

        tokio::fs::write(&from_file, from.bytes())
            .await
            .map_err(|e| io_error(dir, e))?;
        tokio::fs::write(&to_file, to.bytes())
            .await
            .map_err(|e| io_error(dir, e))?;

        for action in &self.actions {
            action
                .apply_files(&self.from_tf, &self.to_tf, &from_file, &to_file, cancel)
                .await?;
        }

        let from = tokio::fs::read(&from_file)
            .await
            .map_err(|e| io_error(dir, e))?;
        let to = tokio::fs::read(&to_file)
            .await
            .map_err(|e| io_error(dir, e))?;
        Ok((State::new(from), State::new(to)))
    }
}

fn io_error(dir: &Path, e: std::io::Error) -> MigrateError {
    MigrateError::cli(Phase::Transform, dir, ExecError::Io(e))
}

#[async_trait]
impl<T: TerraformCli> Migrator for MultiStateMigrator<T> {
    async fn plan(&mut self, cancel: &CancelToken) -> Result<()> {
        self.status.ensure_runnable()?;
        let result = self.run(false, cancel).await;
        self.status = MigrationStatus::after(&result, false);
        result
    }

    async fn apply(&mut self, cancel: &CancelToken) -> Result<()> {
        self.status.ensure_runnable()?;
        let result = self.run(true, cancel).await;
        self.status = MigrationStatus::after(&result, true);
        result
    }

    fn status(&self) -> MigrationStatus {
        self.status
    }
}
