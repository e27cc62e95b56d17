//! Errors which can occur within the `pos` (positional astronomy) module.

use thiserror::Error;

/// An error associated with resolving positions and epochs.
#[derive(Error, Debug)]
pub enum PosError {
    /// The calibrator name is not in the built-in catalogue.
    #[error("unknown calibrator {name:?}; known calibrators are {known}. Supply a position with --calibrator-radec instead")]
    UnknownCalibrator {
        /// The name which was looked up
        name: String,
        /// A comma-separated list of the catalogue's names
        known: String,
    },

    /// A task id doesn't start with a `YYMMDD` date.
    #[error("{source_file}:{source_line}\ntask id {task_id:?} does not start with a YYMMDD date")]
    BadTaskId {
        /// The file where the error originated (usually `file!()`)
        source_file: &'static str,
        /// The line number where the error originated (usually `line!()`)
        source_line: u32,
        /// The offending task id
        task_id: String,
    },
}
