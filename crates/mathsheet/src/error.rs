//! Error types of the worksheet facade.

use mathsheet_core::{CommandError, SerializeError};
use mathsheet_exec::{EquationId, WorkerError};
use thiserror::Error;

/// Loading a [`MathsheetConfig`](crate::MathsheetConfig) failed.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The YAML did not describe a configuration.
    #[error("invalid YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The JSON did not describe a configuration.
    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Worksheet operation errors.
///
/// Problems inside an equation (a placeholder, a syntax error, an undefined name) are not
/// errors here; they end up in that equation's
/// [`EquationStatus`](crate::EquationStatus).
#[derive(Debug, Error)]
pub enum WorksheetError {
    /// The evaluation worker is gone.
    #[error(transparent)]
    Worker(#[from] WorkerError),

    /// An editing command failed.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// A saved equation could not be loaded.
    #[error(transparent)]
    Serialize(#[from] SerializeError),

    /// A saved worksheet is not valid JSON.
    #[error("invalid worksheet file: {0}")]
    Json(#[from] serde_json::Error),

    /// No equation has this id.
    #[error("no equation {0}")]
    UnknownEquation(EquationId),
}
