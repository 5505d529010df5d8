//! Error types for DMC runs.

use thiserror::Error;

/// Errors that can abort a DMC run.
///
/// Numerical trouble inside an iteration (non-finite energies, population
/// ratio breaches) is not represented here: it is reported to the output
/// files and the run carries on.
#[derive(Debug, Error)]
pub enum DmcError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse input: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("communication failure: {0}")]
    Comm(String),

    #[error("walker population died out at iteration {iteration}")]
    PopulationCollapse { iteration: usize },
}

impl DmcError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        DmcError::Config(message.into())
    }

    pub(crate) fn comm(message: impl Into<String>) -> Self {
        DmcError::Comm(message.into())
    }
}

pub type Result<T> = std::result::Result<T, DmcError>;
