//! Migrator trait and run lifecycle

use crate::error::{MigrateError, Result};
use async_trait::async_trait;
use tfshift_exec::CancelToken;

/// A single migration run
///
/// `plan` is a dry run that never pushes. `apply` repeats the whole plan
/// protocol and pushes when verification passes. Once a run has been
/// applied or has failed, the migrator refuses further calls.
#[async_trait]
pub trait Migrator: Send + Sync {
    async fn plan(&mut self, cancel: &CancelToken) -> Result<()>;

    async fn apply(&mut self, cancel: &CancelToken) -> Result<()>;

    fn status(&self) -> MigrationStatus;
}

/// Lifecycle of a migrator: `Created → Planned → Applied`, or `Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MigrationStatus {
    #[default]
    Created,
    Planned,
    Applied,
    Failed,
}

impl MigrationStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, MigrationStatus::Applied | MigrationStatus::Failed)
    }

    pub(crate) fn ensure_runnable(self) -> Result<()> {
        if self.is_finished() {
            return Err(MigrateError::Finished(self));
        }
        Ok(())
    }

    /// Status after a `plan` (`applied == false`) or `apply` call
    pub(crate) fn after<T>(result: &Result<T>, applied: bool) -> Self {
        match (result, applied) {
            (Err(_), _) => MigrationStatus::Failed,
            (Ok(_), false) => MigrationStatus::Planned,
            (Ok(_), true) => MigrationStatus::Applied,
        }
    }
}

impl std::fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MigrationStatus::Created => write!(f, "created"),
            MigrationStatus::Planned => write!(f, "planned"),
            MigrationStatus::Applied => write!(f, "applied"),
            MigrationStatus::Failed => write!(f, "failed"),
        }
    }
}
