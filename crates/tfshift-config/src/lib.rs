//! Migration files
//!
//! A migration file describes one migrator:
//!
//! ```yaml
//! migration:
//!   type: state
//!   dir: infra/network
//!   actions:
//!     - "mv aws_security_group.foo aws_security_group.foo2"
//!     - "rm aws_security_group.baz"
//! ```
//!
//! `type: multi_state` takes `from_dir` / `to_dir` instead of `dir`.
//! Directories are relative to the current directory.

pub mod error;

pub use error::*;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tfshift::MigratorConfig;

/// Environment variable pointing at a migration file
pub const CONFIG_ENV: &str = "TFSHIFT_CONFIG";

/// File names looked up in the current directory, in order
pub const CANDIDATES: [&str; 3] = ["tfshift.yaml", "tfshift.yml", "tfshift.json"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationFile {
    pub migration: MigratorConfig,
}

/// Locate the migration file
///
/// Lookup order:
/// 1. `explicit` (e.g. a command line argument)
/// 2. the `TFSHIFT_CONFIG` environment variable
/// 3. `tfshift.yaml`, `tfshift.yml`, `tfshift.json` in the current directory
pub fn find_migration_file(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return existing(path.to_path_buf());
    }

    if let Some(config_path) = std::env::var(CONFIG_ENV).ok().filter(|p| !p.is_empty()) {
        return existing(PathBuf::from(config_path));
    }

    let current_dir = std::env::current_dir()?;
    for filename in &CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(path);
        }
    }

    Err(ConfigError::MigrationFileNotFound)
}

fn existing(path: PathBuf) -> Result<PathBuf> {
    if path.exists() {
        Ok(path)
    } else {
        Err(ConfigError::MissingFile(path))
    }
}

/// Read and parse a migration file
pub fn load_migration_file(path: &Path) -> Result<MigrationFile> {
    tracing::debug!("Loading migration file {}", path.display());
    let content = std::fs::read_to_string(path)?;
    parse_migration(path, &content)
}

/// Parse migration file contents; `.json` files are JSON, anything else YAML
pub fn parse_migration(path: &Path, content: &str) -> Result<MigrationFile> {
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    if is_json {
        serde_json::from_str(content).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    } else {
        serde_yaml::from_str(content).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }
}
