//! Errors that can occur in the io module

use std::path::PathBuf;

use thiserror::Error;

use crate::{marlu::fitsio, observation::ObservationError};

#[derive(Error, Debug)]
#[allow(clippy::upper_case_acronyms)]
/// All the errors that can occur in file io operations
pub enum IOError {
    /// Error when opening or parsing a csv table.
    #[error("{source_file}:{source_line}\nCouldn't read {path:?}: {csv_error}")]
    Csv {
        /// The underlying [`csv::Error`]
        csv_error: csv::Error,
        /// The table being read
        path: PathBuf,
        /// The file where the error originated (usually `file!()`)
        source_file: &'static str,
        /// The line number where the error originated (usually `line!()`)
        source_line: u32,
    },

    /// A table cell that isn't a number.
    #[error("{path:?}: row {row}, column {column}: can't parse {value:?} as a number")]
    BadValue {
        /// The table being read
        path: PathBuf,
        /// 1-based data row
        row: usize,
        /// Column header
        column: String,
        /// The offending text
        value: String,
    },

    /// Error when creating a fits file.
    #[error("{source_file}:{source_line}\nCouldn't create {fits_filename:?}: {fits_error}")]
    FitsOpen {
        /// The [`fitsio::errors::Error`]
        fits_error: fitsio::errors::Error,
        /// The filename of the fits file
        fits_filename: PathBuf,
        /// The file where the error originated (usually `file!()`)
        source_file: &'static str,
        /// The line number where the error originated (usually `line!()`)
        source_line: u32,
    },

    /// A generic error associated with the fitsio crate.
    #[error("{source_file}:{source_line}\n{fits_filename:?}: {fits_error}")]
    FitsIO {
        /// The [`fitsio::errors::Error`]
        fits_error: fitsio::errors::Error,
        /// The filename of the fits file where the error occurred
        fits_filename: PathBuf,
        /// The file where the error originated (usually `file!()`)
        source_file: &'static str,
        /// The line number where the error originated (usually `line!()`)
        source_line: u32,
    },

    /// A filesystem error with the path it happened on.
    #[error("{path:?}: {io_error}")]
    Io {
        /// The [`std::io::Error`]
        io_error: std::io::Error,
        /// Where it happened
        path: PathBuf,
    },

    #[error("{0}")]
    /// Error derived from [`ObservationError`]
    Observation(#[from] ObservationError),
}
