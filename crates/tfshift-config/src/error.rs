use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "migration file not found. Looked for:\n\
        - the path given on the command line\n\
        - the TFSHIFT_CONFIG environment variable\n\
        - tfshift.yaml, tfshift.yml, tfshift.json in the current directory"
    )]
    MigrationFileNotFound,

    #[error("migration file {} does not exist", .0.display())]
    MissingFile(PathBuf),

    #[error("failed to parse {}: {source}", .path.display())]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
