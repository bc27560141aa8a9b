//! Migration error types

use crate::migrator::MigrationStatus;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tfshift_exec::ExecError;

/// Step of the migration protocol an error comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Building the migrator, before any terraform command
    Config,
    Pull,
    Transform,
    Verify,
    Push,
    Restore,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Config => write!(f, "config"),
            Phase::Pull => write!(f, "pull"),
            Phase::Transform => write!(f, "transform"),
            Phase::Verify => write!(f, "verify"),
            Phase::Push => write!(f, "push"),
            Phase::Restore => write!(f, "restore"),
        }
    }
}

/// Migration errors
///
/// Terraform diagnostics are carried verbatim in the wrapped [`ExecError`].
#[derive(Error, Debug)]
pub enum MigrateError {
    #[error("[config] invalid migration: {0}")]
    ConfigInvalid(String),

    #[error("[transform] `{action}` failed, address not found: {source}")]
    AddressNotFound { action: String, source: ExecError },

    #[error("[transform] `{action}` failed to import: {source}")]
    ImportError { action: String, source: ExecError },

    #[error("[verify] terraform plan reports unexpected diffs in {}", .dir.display())]
    UnexpectedDiff { dir: PathBuf },

    #[error("[push] failed to push the new state in {}: {source}", .dir.display())]
    PushFailed { dir: PathBuf, source: ExecError },

    #[error(
        "[restore] failed to switch {} back to its remote backend: {source}{}",
        .dir.display(),
        previous(.primary)
    )]
    RestoreFailed {
        dir: PathBuf,
        source: ExecError,
        primary: Option<Box<MigrateError>>,
    },

    #[error(
        "[push] partial apply: {} was committed but {} was not: {source}",
        .committed.display(),
        .uncommitted.display()
    )]
    PartialApply {
        committed: PathBuf,
        uncommitted: PathBuf,
        source: Box<MigrateError>,
    },

    #[error("[{phase}] terraform failed in {}: {source}", .dir.display())]
    Cli {
        phase: Phase,
        dir: PathBuf,
        source: ExecError,
    },

    #[error("[{phase}] cancelled")]
    Cancelled { phase: Phase },

    #[error("[verify] failed to save the plan to {}: {source}", .path.display())]
    SavePlan {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("[config] migrator has already finished ({0})")]
    Finished(MigrationStatus),
}

fn previous(primary: &Option<Box<MigrateError>>) -> String {
    match primary {
        Some(err) => format!("\nprevious error: {}", err),
        None => String::new(),
    }
}

impl MigrateError {
    /// Wrap a collaborator failure that happened during `phase`
    pub fn cli(phase: Phase, dir: &Path, source: ExecError) -> Self {
        if source.is_cancelled() {
            return MigrateError::Cancelled { phase };
        }
        MigrateError::Cli {
            phase,
            dir: dir.to_path_buf(),
            source,
        }
    }

    pub fn phase(&self) -> Phase {
        match self {
            MigrateError::ConfigInvalid(_) | MigrateError::Finished(_) => Phase::Config,
            MigrateError::AddressNotFound { .. } | MigrateError::ImportError { .. } => {
                Phase::Transform
            }
            MigrateError::UnexpectedDiff { .. } | MigrateError::SavePlan { .. } => Phase::Verify,
            MigrateError::PushFailed { .. } | MigrateError::PartialApply { .. } => Phase::Push,
            MigrateError::RestoreFailed { .. } => Phase::Restore,
            MigrateError::Cli { phase, .. } | MigrateError::Cancelled { phase } => *phase,
        }
    }

    /// The error that preceded a failed restore, if any
    pub fn primary(&self) -> Option<&MigrateError> {
        match self {
            MigrateError::RestoreFailed { primary, .. } => primary.as_deref(),
            _ => None,
        }
    }
}

/// Combine the outcome of a run with the outcome of restoring its backend
///
/// A restore failure never hides the run's own error; it is kept as the
/// `primary` of the returned [`MigrateError::RestoreFailed`].
pub(crate) fn merge_restore<T>(
    result: Result<T>,
    restored: std::result::Result<(), ExecError>,
    dir: &Path,
) -> Result<T> {
    match restored {
        Ok(()) => result,
        Err(source) => {
            tracing::error!(
                "Failed to switch {} back to remote: {}",
                dir.display(),
                source
            );
            Err(MigrateError::RestoreFailed {
                dir: dir.to_path_buf(),
                source,
                primary: result.err().map(Box::new),
            })
        }
    }
}

pub type Result<T> = std::result::Result<T, MigrateError>;
