//! Terraform CLI client for tfshift
//!
//! This crate wraps the `terraform` binary behind the [`TerraformCli`] trait,
//! so the migration engine can pull, transform, verify and push state
//! documents without knowing how the commands are executed.
//!
//! # Requirements
//!
//! - `terraform` (or a wrapper such as `direnv exec . terraform`) must be
//!   installed and the target directory must be initialised
//!
//! # Example
//!
//! ```ignore
//! use tfshift_exec::{CancelToken, Terraform, TerraformCli};
//!
//! let tf = Terraform::new("infra/network", "terraform")?;
//! let cancel = CancelToken::new();
//!
//! let state = tf.state_pull(&cancel).await?;
//! let state = tf.state_mv_within(&state, "aws_vpc.main", "aws_vpc.this", &cancel).await?;
//! let changed = tf.plan_has_change(Some(&state), None, &cancel).await?;
//! ```

pub mod cancel;
pub mod cli;
pub mod error;
pub mod executor;
pub mod state;
pub mod terraform;

pub use cancel::CancelToken;
pub use cli::{MvOutcome, PlanOptions, PlanOutcome, TerraformCli};
pub use error::{ExecError, Result};
pub use executor::{CommandOutput, Executor};
pub use state::{Plan, State, StateRef};
pub use terraform::{DEFAULT_WORKSPACE, OVERRIDE_FILE_NAME, Terraform};
