//! Terraform CLI trait definition

use crate::cancel::CancelToken;
use crate::error::{ExecError, Result};
use crate::state::{Plan, State, StateRef};
use async_trait::async_trait;
use std::path::Path;

/// Terraform command abstraction bound to one working directory
///
/// The real implementation ([`crate::Terraform`]) shells out to the
/// terraform binary. Each state-manipulation method issues exactly one
/// terraform command. Every method observes `cancel` until the command has
/// been spawned; callers that must not be interrupted pass a fresh token.
#[async_trait]
pub trait TerraformCli: Send + Sync {
    /// Working directory the commands run in
    fn dir(&self) -> &Path;

    /// Run `terraform init` with extra arguments
    async fn init(&self, args: &[String], cancel: &CancelToken) -> Result<()>;

    /// Name of the currently selected workspace
    async fn workspace_show(&self, cancel: &CancelToken) -> Result<String>;

    async fn workspace_select(&self, workspace: &str, cancel: &CancelToken) -> Result<()>;

    async fn workspace_new(&self, workspace: &str, cancel: &CancelToken) -> Result<()>;

    /// Read the current state from the configured backend
    async fn state_pull(&self, cancel: &CancelToken) -> Result<State>;

    /// Write a state to the configured backend
    ///
    /// `force` skips terraform's lineage and serial checks.
    async fn state_push(&self, state: &State, force: bool, cancel: &CancelToken) -> Result<()>;

    /// Move `source` in `from` to `destination`
    ///
    /// With `to` set the address is moved into that document instead of
    /// being renamed within `from`. Memory documents come back in the
    /// returned [`MvOutcome`]; file documents are updated in place.
    async fn state_mv(
        &self,
        from: StateRef<'_>,
        to: Option<StateRef<'_>>,
        source: &str,
        destination: &str,
        cancel: &CancelToken,
    ) -> Result<MvOutcome>;

    /// Remove every address in one command
    async fn state_rm(
        &self,
        state: &State,
        addresses: &[String],
        cancel: &CancelToken,
    ) -> Result<State>;

    /// Import an existing object into `address`
    async fn import(
        &self,
        state: &State,
        address: &str,
        id: &str,
        cancel: &CancelToken,
    ) -> Result<State>;

    /// List tracked addresses, optionally filtered
    ///
    /// Without a state the configured backend is read.
    async fn state_list(
        &self,
        state: Option<&State>,
        addresses: &[String],
        cancel: &CancelToken,
    ) -> Result<Vec<String>>;

    /// Plan the configuration against `state` (or the configured backend)
    async fn plan(
        &self,
        state: Option<&State>,
        options: &PlanOptions,
        cancel: &CancelToken,
    ) -> Result<PlanOutcome>;

    /// Apply a previously saved plan
    async fn apply(&self, plan: &Plan, cancel: &CancelToken) -> Result<()>;

    /// Point the directory at a local backend so state commands stay local
    async fn override_backend_to_local(&self, workspace: &str, cancel: &CancelToken)
    -> Result<()>;

    /// Undo [`TerraformCli::override_backend_to_local`]
    async fn switch_back_to_remote(&self, workspace: &str, cancel: &CancelToken) -> Result<()>;

    /// Whether a plan reports any change
    async fn plan_has_change(
        &self,
        state: Option<&State>,
        target: Option<&str>,
        cancel: &CancelToken,
    ) -> Result<bool> {
        let options = PlanOptions {
            target: target.map(str::to_string),
            ..Default::default()
        };
        Ok(self.plan(state, &options, cancel).await?.has_change)
    }

    /// Rename an address within one in-memory state
    async fn state_mv_within(
        &self,
        state: &State,
        source: &str,
        destination: &str,
        cancel: &CancelToken,
    ) -> Result<State> {
        let outcome = self
            .state_mv(StateRef::Memory(state), None, source, destination, cancel)
            .await?;
        outcome
            .from
            .ok_or_else(|| ExecError::MissingOutput(format!("state mv {} {}", source, destination)))
    }

    /// Whether `address` (a resource, instance or module prefix) matches
    /// anything in `state`
    async fn state_tracks(
        &self,
        state: &State,
        address: &str,
        cancel: &CancelToken,
    ) -> Result<bool> {
        let found = self
            .state_list(Some(state), &[address.to_string()], cancel)
            .await?;
        Ok(!found.is_empty())
    }
}

/// Documents returned by [`TerraformCli::state_mv`]
#[derive(Debug, Clone, Default)]
pub struct MvOutcome {
    /// New source document, when it was passed in memory
    pub from: Option<State>,
    /// New destination document, when it was passed in memory
    pub to: Option<State>,
}

/// Options for [`TerraformCli::plan`]
#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    /// Restrict the plan to one address
    pub target: Option<String>,
    /// Extra flags such as `-var-file=prod.tfvars`
    pub args: Vec<String>,
    /// Keep the plan file so it can be saved or applied later
    pub save: bool,
}

/// Result of [`TerraformCli::plan`]
#[derive(Debug, Clone)]
pub struct PlanOutcome {
    pub has_change: bool,
    /// Present when [`PlanOptions::save`] was set
    pub plan: Option<Plan>,
}

