//! Cross-state actions
//!
//! A move between two directories goes through an empty buffer state:
//! first out of "from" into the buffer under the source address, then out
//! of the buffer into "to" under the destination address. At every step
//! the resource lives in exactly one of the three documents, and the buffer
//! is dropped once the action completes.

use crate::action::{arity_error, split_action};
use crate::error::{MigrateError, Phase, Result};
use std::path::Path;
use std::str::FromStr;
use tfshift_exec::{CancelToken, ExecError, State, StateRef, TerraformCli};

/// A primitive transform of a pair of state documents
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MultiStateAction {
    /// `mv <source> <destination>`: `source` is resolved in "from" and
    /// `destination` in "to"
    Mv { source: String, destination: String },
}

impl MultiStateAction {
    pub fn mv(source: impl Into<String>, destination: impl Into<String>) -> Self {
        MultiStateAction::Mv {
            source: source.into(),
            destination: destination.into(),
        }
    }

    /// Apply the action to in-memory states, returning the new `(from, to)`
    pub async fn apply<F, T>(
        &self,
        from_tf: &F,
        to_tf: &T,
        from: &State,
        to: &State,
        cancel: &CancelToken,
    ) -> Result<(State, State)>
    where
        F: TerraformCli + ?Sized,
        T: TerraformCli + ?Sized,
    {
        let MultiStateAction::Mv {
            source,
            destination,
        } = self;

        let buffer = State::empty();
        let first = from_tf
            .state_mv(
                StateRef::Memory(from),
                Some(StateRef::Memory(&buffer)),
                source,
                source,
                cancel,
            )
            .await
            .map_err(|e| self.transform_error(from_tf.dir(), e))?;
        let (new_from, buffer) = match (first.from, first.to) {
            (Some(from), Some(buffer)) => (from, buffer),
            _ => return Err(self.missing_output(from_tf.dir())),
        };

        let second = to_tf
            .state_mv(
                StateRef::Memory(&buffer),
                Some(StateRef::Memory(to)),
                source,
                destination,
                cancel,
            )
            .await
            .map_err(|e| self.transform_error(to_tf.dir(), e))?;
        let new_to = second.to.ok_or_else(|| self.missing_output(to_tf.dir()))?;

        Ok((new_from, new_to))
    }

    /// Apply the action to on-disk state files, updating them in place
    pub async fn apply_files<F, T>(
        &self,
        from_tf: &F,
        to_tf: &T,
        from_file: &Path,
        to_file: &Path,
        cancel: &CancelToken,
    ) -> Result<()>
    where
        F: TerraformCli + ?Sized,
        T: TerraformCli + ?Sized,
    {
        let MultiStateAction::Mv {
            source,
            destination,
        } = self;

        let buffer = State::empty();
        let first = from_tf
            .state_mv(
                StateRef::File(from_file),
                Some(StateRef::Memory(&buffer)),
                source,
                source,
                cancel,
            )
            .await
            .map_err(|e| self.transform_error(from_tf.dir(), e))?;
        let buffer = first.to.ok_or_else(|| self.missing_output(from_tf.dir()))?;

        to_tf
            .state_mv(
                StateRef::Memory(&buffer),
                Some(StateRef::File(to_file)),
                source,
                destination,
                cancel,
            )
            .await
            .map_err(|e| self.transform_error(to_tf.dir(), e))?;
        Ok(())
    }

    fn transform_error(&self, dir: &Path, err: ExecError) -> MigrateError {
        match err {
            ExecError::CommandFailed { .. } => MigrateError::AddressNotFound {
                action: self.to_string(),
                source: err,
            },
            other => MigrateError::cli(Phase::Transform, dir, other),
        }
    }

    fn missing_output(&self, dir: &Path) -> MigrateError {
        MigrateError::cli(
            Phase::Transform,
            dir,
            ExecError::MissingOutput(self.to_string()),
        )
    }
}

impl std::fmt::Display for MultiStateAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MultiStateAction::Mv {
                source,
                destination,
            } => write!(f, "mv {} {}", source, destination),
        }
    }
}

impl FromStr for MultiStateAction {
    type Err = MigrateError;

    fn from_str(line: &str) -> Result<Self> {
        let args = split_action(line)?;
        match args.as_slice() {
            [verb, source, destination] if verb == "mv" => {
                Ok(MultiStateAction::mv(source, destination))
            }
            [verb, ..] if verb == "mv" => Err(arity_error(line, "mv <source> <destination>")),
            [verb, ..] => Err(MigrateError::ConfigInvalid(format!(
                "unknown multi state action type `{}` in `{}`",
                verb, line
            ))),
            [] => Err(MigrateError::ConfigInvalid("empty action".to_string())),
        }
    }
}
