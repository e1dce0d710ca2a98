//! CLI command implementations.

pub mod dataset;
pub mod demo;
pub mod run;
pub mod script;

use reltx_core::CoreError;
use thiserror::Error;

/// Errors of the CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// Reading an input file failed.
    #[error("cannot read {path}: {source}")]
    Io {
        /// The file.
        path: String,
        /// The underlying error.
        source: std::io::Error,
    },

    /// An input file is not valid JSON for its format.
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    /// The dataset contradicts its own mapping.
    #[error("invalid dataset: {0}")]
    Dataset(String),

    /// A script step names an alias nobody defined.
    #[error("unknown object alias '{0}'")]
    UnknownAlias(String),

    /// A script step defines an alias twice.
    #[error("object alias '{0}' is already defined")]
    DuplicateAlias(String),

    /// A sub-transaction step ran while only the root was active.
    #[error("no sub-transaction is active")]
    NoSubTransaction,

    /// The core rejected an operation.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Some script steps failed.
    #[error("{0} step(s) failed")]
    StepsFailed(usize),
}

/// Result type of the CLI commands.
pub type CliResult<T> = Result<T, CliError>;
