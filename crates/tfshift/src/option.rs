//! Run-wide migrator options

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default terraform command
pub const DEFAULT_EXEC_PATH: &str = "terraform";

/// Options shared by every migrator of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigratorOption {
    /// Command used to invoke terraform; may contain arguments
    /// (e.g. `direnv exec . terraform`)
    pub exec_path: String,
    /// Where a forced plan is saved, relative to the migrated directory
    pub plan_out: Option<PathBuf>,
    /// Extra flags appended to every plan check
    pub plan_args: Vec<String>,
}

impl Default for MigratorOption {
    fn default() -> Self {
        Self {
            exec_path: DEFAULT_EXEC_PATH.to_string(),
            plan_out: None,
            plan_args: Vec::new(),
        }
    }
}

impl MigratorOption {
    /// Load options from `TFSHIFT_EXEC_PATH` and `TFSHIFT_PLAN_OUT`
    pub fn from_env() -> Self {
        let mut option = Self::default();
        if let Some(exec_path) = non_empty_env("TFSHIFT_EXEC_PATH") {
            option.exec_path = exec_path;
        }
        option.plan_out = non_empty_env("TFSHIFT_PLAN_OUT").map(PathBuf::from);
        option
    }

    pub fn with_exec_path(mut self, exec_path: impl Into<String>) -> Self {
        self.exec_path = exec_path.into();
        self
    }

    pub fn with_plan_out(mut self, plan_out: impl Into<PathBuf>) -> Self {
        self.plan_out = Some(plan_out.into());
        self
    }

    pub fn with_plan_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.plan_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// `exec_path`, falling back to the default when blank
    pub fn exec_path(&self) -> &str {
        if self.exec_path.trim().is_empty() {
            DEFAULT_EXEC_PATH
        } else {
            &self.exec_path
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
