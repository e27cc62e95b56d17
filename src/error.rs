//! Errors that can occur in driftcube

use thiserror::Error;

use crate::{
    cube::CubeError, gridding::GridError, io::error::IOError, observation::ObservationError,
    pipeline::{BeamModelConfigBuilderError, GeometryError},
    pos::PosError,
};

#[derive(Error, Debug)]
/// Errors relating to CLI Parsing
pub enum CLIError {
    #[error("Invalid Command Line Argument {option}. Expected {expected}, received {received}")]
    /// When a bad CLI argument is provided
    InvalidCommandLineArgument {
        /// The argument name within the clap parser
        option: String,
        /// The expected value
        expected: String,
        /// The received value
        received: String,
    },
}

#[derive(Error, Debug)]
/// Any of the errors that driftcube can raise
pub enum DriftError {
    #[error(transparent)]
    /// Error derived from [`PosError`]
    PosError(#[from] PosError),

    #[error(transparent)]
    /// Error derived from [`IOError`]
    IOError(#[from] IOError),

    #[error(transparent)]
    /// Error derived from [`ObservationError`]
    ObservationError(#[from] ObservationError),

    #[error(transparent)]
    /// Error derived from [`GridError`]
    GridError(#[from] GridError),

    #[error(transparent)]
    /// Error derived from [`CubeError`]
    CubeError(#[from] CubeError),

    #[error(transparent)]
    /// Error derived from [`GeometryError`]
    GeometryError(#[from] GeometryError),

    #[error(transparent)]
    /// Error derived from [`BeamModelConfigBuilderError`]
    ConfigError(#[from] BeamModelConfigBuilderError),

    #[error(transparent)]
    /// Error derived from [`CLIError`]
    CLIError(#[from] CLIError),

    #[cfg(feature = "cli")]
    #[error(transparent)]
    /// Error derived from [`clap::Error`]
    ClapError(#[from] clap::Error),

    #[error("None of the {num_tasks} tasks could be loaded")]
    /// No observation could be loaded, so there's nothing to grid.
    NoObservations {
        /// Number of task ids which were tried
        num_tasks: usize,
    },

    #[error("No task ids were given")]
    /// The task id list was empty
    NoTaskIds,

    #[error("Dry run")]
    /// The arguments were parsed, but the user only wanted a summary
    DryRun {},
}
