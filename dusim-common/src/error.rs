//! Error type shared by the dusim crates

use thiserror::Error;

/// Configuration and identifier errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing field, malformed identifier or bad key material. The message
    /// names the offending field.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cannot read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
