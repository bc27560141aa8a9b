//! tfshift migration engine
//!
//! Moves, renames, removes and imports resources in terraform state without
//! running an apply. A migration pulls the remote state, transforms a local
//! copy, checks that `terraform plan` reports no unexpected diffs, and only
//! then pushes the result back.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │                 tfshift-cli / caller             │
//! └─────────────────┬────────────────────────────────┘
//!                   │ MigratorConfig / MigratorOption
//! ┌─────────────────▼────────────────────────────────┐
//! │                     tfshift                      │
//! │  ┌───────────────┐      ┌─────────────────────┐  │
//! │  │ StateMigrator │      │ MultiStateMigrator  │  │
//! │  └───────┬───────┘      └──────────┬──────────┘  │
//! │  ┌───────▼───────┐      ┌──────────▼──────────┐  │
//! │  │  StateAction  │      │  MultiStateAction   │  │
//! │  └───────────────┘      └─────────────────────┘  │
//! │        work dir setup / verify / restore         │
//! └─────────────────┬────────────────────────────────┘
//!                   │ trait TerraformCli
//! ┌─────────────────▼────────────────────────────────┐
//! │                  tfshift-exec                    │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use tfshift::{Migrator, MigratorOption, StateAction, StateMigrator};
//! use tfshift_exec::{CancelToken, Terraform};
//!
//! let tf = Terraform::new("infra/network", "terraform")?;
//! let actions = vec![StateAction::mv("null_resource.foo", "null_resource.foo2")];
//! let mut migrator =
//!     StateMigrator::new(tf, "default", actions, MigratorOption::default(), false, false);
//!
//! let cancel = CancelToken::new();
//! migrator.plan(&cancel).await?;
//! migrator.apply(&cancel).await?;
//! ```

pub mod action;
pub mod config;
pub mod error;
pub mod migrator;
pub mod multi_action;
pub mod multi_state_migrator;
pub mod option;
pub mod state_migrator;
mod workdir;

// Re-exports
pub use action::StateAction;
pub use config::{MigratorConfig, MultiStateMigratorConfig, StateMigratorConfig};
pub use error::{MigrateError, Phase, Result};
pub use migrator::{MigrationStatus, Migrator};
pub use multi_action::MultiStateAction;
pub use multi_state_migrator::MultiStateMigrator;
pub use option::MigratorOption;
pub use state_migrator::StateMigrator;
