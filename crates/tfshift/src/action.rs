//! Single-state actions
//!
//! An action is one `terraform state` primitive applied to an in-memory
//! state. Each one issues exactly one mutating terraform command; `rm`
//! looks its addresses up with `state list` first.

use crate::error::{MigrateError, Phase, Result};
use std::str::FromStr;
use tfshift_exec::{CancelToken, ExecError, State, TerraformCli};

/// A primitive transform of one state document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateAction {
    /// `mv <source> <destination>`: rename a resource or module address
    Mv { source: String, destination: String },
    /// `rm <address>...`: stop tracking addresses, all or nothing
    Rm { addresses: Vec<String> },
    /// `import <address> <id>`: start tracking an existing object
    Import { address: String, id: String },
}

impl StateAction {
    pub fn mv(source: impl Into<String>, destination: impl Into<String>) -> Self {
        StateAction::Mv {
            source: source.into(),
            destination: destination.into(),
        }
    }

    pub fn rm<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        StateAction::Rm {
            addresses: addresses.into_iter().map(Into::into).collect(),
        }
    }

    pub fn import(address: impl Into<String>, id: impl Into<String>) -> Self {
        StateAction::Import {
            address: address.into(),
            id: id.into(),
        }
    }

    /// Apply the action to `state` and return the new state
    pub async fn apply<T>(&self, tf: &T, state: &State, cancel: &CancelToken) -> Result<State>
    where
        T: TerraformCli + ?Sized,
    {
        tracing::debug!("Applying `{}` in {}", self, tf.dir().display());
        let result = match self {
            StateAction::Mv {
                source,
                destination,
            } => tf.state_mv_within(state, source, destination, cancel).await,
            StateAction::Rm { addresses } => {
                self.ensure_tracked(tf, state, addresses, cancel).await?;
                tf.state_rm(state, addresses, cancel).await
            }
            StateAction::Import { address, id } => tf.import(state, address, id, cancel).await,
        };
        result.map_err(|e| self.transform_error(tf, e))
    }

    /// `terraform state rm` removes whatever matches and only fails when
    /// nothing does, so every address is looked up before the removal.
    async fn ensure_tracked<T>(
        &self,
        tf: &T,
        state: &State,
        addresses: &[String],
        cancel: &CancelToken,
    ) -> Result<()>
    where
        T: TerraformCli + ?Sized,
    {
        for address in addresses {
            let tracked = tf
                .state_tracks(state, address, cancel)
                .await
                .map_err(|e| self.transform_error(tf, e))?;
            if !tracked {
                return Err(MigrateError::AddressNotFound {
                    action: self.to_string(),
                    source: ExecError::NoMatch(address.clone()),
                });
            }
        }
        Ok(())
    }

    fn transform_error<T>(&self, tf: &T, err: ExecError) -> MigrateError
    where
        T: TerraformCli + ?Sized,
    {
        match err {
            ExecError::CommandFailed { .. } => match self {
                StateAction::Import { .. } => MigrateError::ImportError {
                    action: self.to_string(),
                    source: err,
                },
                StateAction::Mv { .. } | StateAction::Rm { .. } => MigrateError::AddressNotFound {
                    action: self.to_string(),
                    source: err,
                },
            },
            other => MigrateError::cli(Phase::Transform, tf.dir(), other),
        }
    }
}

impl std::fmt::Display for StateAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StateAction::Mv {
                source,
                destination,
            } => write!(f, "mv {} {}", source, destination),
            StateAction::Rm { addresses } => write!(f, "rm {}", addresses.join(" ")),
            StateAction::Import { address, id } => write!(f, "import {} {}", address, id),
        }
    }
}

impl FromStr for StateAction {
    type Err = MigrateError;

    /// Parse `mv <src> <dst>`, `rm <addr>...` or `import <addr> <id>`
    fn from_str(line: &str) -> Result<Self> {
        let args = split_action(line)?;
        let (verb, rest) = args
            .split_first()
            .ok_or_else(|| MigrateError::ConfigInvalid("empty action".to_string()))?;

        match (verb.as_str(), rest) {
            ("mv", [source, destination]) => Ok(StateAction::mv(source, destination)),
            ("mv", _) => Err(arity_error(line, "mv <source> <destination>")),
            ("rm", []) => Err(arity_error(line, "rm <address> [<address>...]")),
            ("rm", addresses) => Ok(StateAction::rm(addresses.iter().cloned())),
            ("import", [address, id]) => Ok(StateAction::import(address, id)),
            ("import", _) => Err(arity_error(line, "import <address> <id>")),
            (other, _) => Err(MigrateError::ConfigInvalid(format!(
                "unknown action type `{}` in `{}`",
                other, line
            ))),
        }
    }
}

pub(crate) fn arity_error(line: &str, usage: &str) -> MigrateError {
    MigrateError::ConfigInvalid(format!(
        "wrong number of arguments in `{}`, expected `{}`",
        line, usage
    ))
}

/// Split an action line into words
///
/// Words are separated by whitespace. Single quotes group a word that
/// contains spaces (e.g. an import ID) and are removed; double quotes are
/// part of resource addresses like `aws_instance.web["a"]` and are kept.
pub(crate) fn split_action(line: &str) -> Result<Vec<String>> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quoted = false;

    for c in line.chars() {
        match c {
            '\'' => {
                quoted = !quoted;
                in_word = true;
            }
            c if c.is_whitespace() && !quoted => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            c => {
                current.push(c);
                in_word = true;
            }
        }
    }

    if quoted {
        return Err(MigrateError::ConfigInvalid(format!(
            "unterminated quote in `{}`",
            line
        )));
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}
