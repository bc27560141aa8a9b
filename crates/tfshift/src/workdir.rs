//! Working directory protocol shared by both migrators
//!
//! `setup` pulls the remote state and points the directory at a local
//! backend; `switch_back` undoes that. Transforms and plan checks run
//! against the local override. `push` runs after `switch_back` so that it
//! reaches the remote backend.

use crate::error::{MigrateError, Phase, Result, merge_restore};
use crate::option::MigratorOption;
use tfshift_exec::{CancelToken, DEFAULT_WORKSPACE, ExecError, PlanOptions, State, TerraformCli};

pub(crate) fn workspace_or_default(workspace: &str) -> String {
    if workspace.is_empty() {
        DEFAULT_WORKSPACE.to_string()
    } else {
        workspace.to_string()
    }
}

/// Select `workspace`, pull its state and override the backend to local
///
/// If the override fails half way, the directory is switched back before
/// returning.
pub(crate) async fn setup<T>(tf: &T, workspace: &str, cancel: &CancelToken) -> Result<State>
where
    T: TerraformCli + ?Sized,
{
    let dir = tf.dir();
    let pull_error = |e: ExecError| MigrateError::cli(Phase::Pull, dir, e);

    let current = tf.workspace_show(cancel).await.map_err(pull_error)?;
    if current != workspace {
        tracing::info!(
            "Selecting workspace {} in {} (was {})",
            workspace,
            dir.display(),
            current
        );
        tf.workspace_select(workspace, cancel)
            .await
            .map_err(pull_error)?;
    }

    let state = tf.state_pull(cancel).await.map_err(pull_error)?;
    tracing::info!("Pulled state of {} ({} bytes)", dir.display(), state.len());

    if let Err(e) = tf.override_backend_to_local(workspace, cancel).await {
        let failed: Result<State> = Err(pull_error(e));
        let restored = switch_back(tf, workspace).await;
        return merge_restore(failed, restored, dir);
    }
    Ok(state)
}

/// Restore the remote backend; never interrupted by cancellation
pub(crate) async fn switch_back<T>(tf: &T, workspace: &str) -> std::result::Result<(), ExecError>
where
    T: TerraformCli + ?Sized,
{
    tf.switch_back_to_remote(workspace, &CancelToken::new())
        .await
}

/// Check that `state` matches the configuration of the directory
///
/// A diff is an error unless `force` is set, in which case the plan is
/// saved to `plan_out` when one is configured.
pub(crate) async fn verify<T>(
    tf: &T,
    state: &State,
    option: &MigratorOption,
    force: bool,
    cancel: &CancelToken,
) -> Result<()>
where
    T: TerraformCli + ?Sized,
{
    let dir = tf.dir();
    let options = PlanOptions {
        target: None,
        args: option.plan_args.clone(),
        save: force && option.plan_out.is_some(),
    };

    let outcome = tf
        .plan(Some(state), &options, cancel)
        .await
        .map_err(|e| MigrateError::cli(Phase::Verify, dir, e))?;

    if !outcome.has_change {
        tracing::info!("No changes in {}", dir.display());
        return Ok(());
    }
    if !force {
        return Err(MigrateError::UnexpectedDiff {
            dir: dir.to_path_buf(),
        });
    }

    tracing::warn!(
        "terraform plan reports diffs in {}, continuing because force is set",
        dir.display()
    );
    if let (Some(plan_out), Some(plan)) = (&option.plan_out, &outcome.plan) {
        let path = dir.join(plan_out);
        tokio::fs::write(&path, plan.bytes())
            .await
            .map_err(|source| MigrateError::SavePlan {
                path: path.clone(),
                source,
            })?;
        tracing::info!("Saved plan to {}", path.display());
    }
    Ok(())
}

/// Push `state` to the remote backend
///
/// Cancellation is honoured up to this point; once issued the push runs to
/// completion.
pub(crate) async fn push<T>(tf: &T, state: &State, cancel: &CancelToken) -> Result<()>
where
    T: TerraformCli + ?Sized,
{
    if cancel.is_cancelled() {
        return Err(MigrateError::Cancelled { phase: Phase::Push });
    }

    let dir = tf.dir();
    tracing::info!("Pushing new state of {}", dir.display());
    tf.state_push(state, true, &CancelToken::new())
        .await
        .map_err(|source| MigrateError::PushFailed {
            dir: dir.to_path_buf(),
            source,
        })
}
