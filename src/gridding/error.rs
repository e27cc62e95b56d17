//! Errors from scattered-data gridding.

use spade::InsertionError;
use thiserror::Error;

#[derive(Error, Clone, Debug, PartialEq)]
pub enum GridError {
    #[error("got {xs} x coordinates but {ys} y coordinates")]
    MismatchedLengths { xs: usize, ys: usize },

    #[error("sample {index} has a non-finite position")]
    NonFinitePosition { index: usize },

    #[error("need at least 3 distinct sample positions to triangulate, found {found}")]
    NotEnoughSamples { found: usize },

    #[error("sample position {index} could not be triangulated: {reason:?}")]
    Unplaceable {
        index: usize,
        reason: InsertionError,
    },

    #[error("sample positions are degenerate (collinear), no triangles could be formed")]
    Degenerate,

    #[error("expected {expected} sample values, got {found}")]
    ValueCount { expected: usize, found: usize },
}
