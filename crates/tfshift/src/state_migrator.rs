//! Single-directory migrator

use crate::action::StateAction;
use crate::error::{Result, merge_restore};
use crate::migrator::{MigrationStatus, Migrator};
use crate::option::MigratorOption;
use crate::workdir;
use async_trait::async_trait;
use tfshift_exec::{CancelToken, State, TerraformCli};

/// Applies a list of [`StateAction`]s to the state of one directory
///
/// Each run pulls the state, transforms a local copy, verifies it with
/// `terraform plan` and switches the backend back to remote on every exit
/// path. `apply` then pushes the verified state.
pub struct StateMigrator<T: TerraformCli> {
    tf: T,
    workspace: String,
    actions: Vec<StateAction>,
    option: MigratorOption,
    force: bool,
    skip_plan: bool,
    status: MigrationStatus,
}

impl<T: TerraformCli> StateMigrator<T> {
    /// An empty `workspace` means `default`
    pub fn new(
        tf: T,
        workspace: impl Into<String>,
        actions: Vec<StateAction>,
        option: MigratorOption,
        force: bool,
        skip_plan: bool,
    ) -> Self {
        Self {
            tf,
            workspace: workdir::workspace_or_default(&workspace.into()),
            actions,
            option,
            force,
            skip_plan,
            status: MigrationStatus::default(),
        }
    }

    pub fn terraform(&self) -> &T {
        &self.tf
    }

    pub fn workspace(&self) -> &str {
        &self.workspace
    }

    pub fn actions(&self) -> &[StateAction] {
        &self.actions
    }

    async fn run(&self, commit: bool, cancel: &CancelToken) -> Result<()> {
        let dir = self.tf.dir();
        tracing::info!(
            "Migrating {} (workspace {}, {} actions)",
            dir.display(),
            self.workspace,
            self.actions.len()
        );

        let state = workdir::setup(&self.tf, &self.workspace, cancel).await?;
        let result = self.transform_and_verify(state, cancel).await;
        let restored = workdir::switch_back(&self.tf, &self.workspace).await;
        let new_state = merge_restore(result, restored, dir)?;

        if commit {
            workdir::push(&self.tf, &new_state, cancel).await?;
            tracing::info!("Applied migration to {}", dir.display());
        } else {
            tracing::info!("Planned migration of {}", dir.display());
        }
        Ok(())
    }

    async fn transform_and_verify(&self, mut state: State, cancel: &CancelToken) -> Result<State> {
        for action in &self.actions {
            state = action.apply(&self.tf, &state, cancel).await?;
        }

        if self.skip_plan {
            tracing::info!("Skipping plan check in {}", self.tf.dir().display());
        } else {
            workdir::verify(&self.tf, &state, &self.option, self.force, cancel).await?;
        }
        Ok(state)
    }
}

#[async_trait]
impl<T: TerraformCli> Migrator for StateMigrator<T> {
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
