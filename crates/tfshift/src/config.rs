//! Declarative migrator configuration
//!
//! Configs hold actions as strings, exactly as written in a migration file,
//! and are validated when the migrator is built.

use crate::action::StateAction;
use crate::error::{MigrateError, Phase, Result};
use crate::migrator::Migrator;
use crate::multi_action::MultiStateAction;
use crate::multi_state_migrator::MultiStateMigrator;
use crate::option::MigratorOption;
use crate::state_migrator::StateMigrator;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tfshift_exec::Terraform;

/// Any migrator, tagged by `type`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MigratorConfig {
    State(StateMigratorConfig),
    MultiState(MultiStateMigratorConfig),
}

impl MigratorConfig {
    pub fn new_migrator(&self, option: &MigratorOption) -> Result<Box<dyn Migrator>> {
        match self {
            MigratorConfig::State(config) => Ok(Box::new(config.new_migrator(option)?)),
            MigratorConfig::MultiState(config) => Ok(Box::new(config.new_migrator(option)?)),
        }
    }
}

/// Migration of a single directory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateMigratorConfig {
    /// Working directory; empty means the current directory
    pub dir: PathBuf,
    /// Empty means `default`
    pub workspace: String,
    pub actions: Vec<String>,
    /// Accept a non-empty plan
    pub force: bool,
    /// Push without a plan check
    pub skip_plan: bool,
}

impl StateMigratorConfig {
    pub fn parse_actions(&self) -> Result<Vec<StateAction>> {
        parse_all(&self.actions)
    }

    pub fn new_migrator(&self, option: &MigratorOption) -> Result<StateMigrator<Terraform>> {
        let actions = self.parse_actions()?;
        let tf = terraform(&self.dir, option)?;
        Ok(StateMigrator::new(
            tf,
            self.workspace.clone(),
            actions,
            option.clone(),
            self.force,
            self.skip_plan,
        ))
    }
}

/// Migration of resources from one directory to another
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiStateMigratorConfig {
    pub from_dir: PathBuf,
    pub to_dir: PathBuf,
    pub from_workspace: String,
    pub to_workspace: String,
    pub actions: Vec<String>,
    pub force: bool,
    pub from_skip_plan: bool,
    pub to_skip_plan: bool,
}

impl MultiStateMigratorConfig {
    pub fn parse_actions(&self) -> Result<Vec<MultiStateAction>> {
        parse_all(&self.actions)
    }

    pub fn new_migrator(&self, option: &MigratorOption) -> Result<MultiStateMigrator<Terraform>> {
        if self.from_dir.as_os_str().is_empty() {
            return Err(MigrateError::ConfigInvalid("from_dir is required".to_string()));
        }
        if self.to_dir.as_os_str().is_empty() {
            return Err(MigrateError::ConfigInvalid("to_dir is required".to_string()));
        }

        let actions = self.parse_actions()?;
        let from_tf = terraform(&self.from_dir, option)?;
        let to_tf = terraform(&self.to_dir, option)?;

        Ok(MultiStateMigrator::new(from_tf, to_tf, actions, option.clone())
            .with_workspaces(&self.from_workspace, &self.to_workspace)
            .with_force(self.force)
            .with_skip_plan(self.from_skip_plan, self.to_skip_plan))
    }
}

fn parse_all<A>(lines: &[String]) -> Result<Vec<A>>
where
    A: FromStr<Err = MigrateError>,
{
    if lines.is_empty() {
        return Err(MigrateError::ConfigInvalid(
            "actions must not be empty".to_string(),
        ));
    }
    lines.iter().map(|line| line.parse()).collect()
}

fn terraform(dir: &Path, option: &MigratorOption) -> Result<Terraform> {
    Terraform::new(dir, option.exec_path()).map_err(|e| MigrateError::cli(Phase::Config, dir, e))
}
