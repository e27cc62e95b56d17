//! Drift scan observations: auto-correlation time series, and the positions
//! each compound beam pointed at.

use std::collections::HashMap;

use thiserror::Error;

use crate::{cube::Polarisation, marlu::HADec};

/// Name of the timestamp column, in MJD seconds.
pub const TIME_COLUMN: &str = "time";
/// Beam hour angle column (radians).
pub const HA_COLUMN: &str = "ha";
/// Beam declination column (radians).
pub const DEC_COLUMN: &str = "dec";

#[derive(Error, Clone, Debug, PartialEq)]
pub enum ObservationError {
    #[error("task {task_id} has no column {column}")]
    MissingColumn { task_id: String, column: String },

    #[error("task {task_id} has no position for beam {beam} ({num_beams} beams)")]
    MissingBeam {
        task_id: String,
        beam: usize,
        num_beams: usize,
    },

    #[error("column {column} has {found} rows, expected {expected}")]
    RaggedColumn {
        column: String,
        expected: usize,
        found: usize,
    },
}

/// The name of the auto-correlation column for a beam, frequency bin and
/// polarisation. Per-antenna data has an `_antenna_<a>` suffix; data from a
/// single dish (or averaged over dishes) has none.
///
/// ```rust
/// use driftcube::{cube::Polarisation, observation::column_name};
///
/// assert_eq!(
///     column_name(7, 3, Polarisation::YY, Some(11)),
///     "auto_corr_beam_7_freq_3_yy_antenna_11"
/// );
/// assert_eq!(column_name(0, 0, Polarisation::XX, None), "auto_corr_beam_0_freq_0_xx");
/// ```
pub fn column_name(beam: usize, bin: usize, pol: Polarisation, antenna: Option<usize>) -> String {
    let mut name = format!("auto_corr_beam_{}_freq_{}_{}", beam, bin, pol.label());
    if let Some(antenna) = antenna {
        name.push_str(&format!("_antenna_{}", antenna));
    }
    name
}

/// The median of the non-NaN values, or NaN if there are none.
pub fn nan_median(values: &[f64]) -> f64 {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return f64::NAN;
    }
    sorted.sort_unstable_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Named numeric columns of equal length.
#[derive(Clone, Debug, Default)]
pub struct ColumnTable {
    names: Vec<String>,
    index: HashMap<String, usize>,
    columns: Vec<Vec<f64>>,
}

impl ColumnTable {
    /// # Errors
    ///
    /// Fails if the columns differ in length.
    pub fn new(names: Vec<String>, columns: Vec<Vec<f64>>) -> Result<Self, ObservationError> {
        let expected = columns.first().map_or(0, Vec::len);
        for (name, column) in names.iter().zip(&columns) {
            if column.len() != expected {
                return Err(ObservationError::RaggedColumn {
                    column: name.clone(),
                    expected,
                    found: column.len(),
                });
            }
        }
        // later duplicates shadow earlier ones
        let index = names
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.clone(), idx))
            .collect();
        Ok(Self {
            names,
            index,
            columns,
        })
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.index.get(name).map(|&idx| self.columns[idx].as_slice())
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }
}

/// One drift scan session, identified by its task id.
#[derive(Clone, Debug)]
pub struct Observation {
    pub task_id: String,
    /// Timestamps of the auto-correlation samples, MJD seconds
    pub times_mjd_s: Vec<f64>,
    data: ColumnTable,
    /// Pointing centre of each beam, indexed by beam number
    beam_hadec: Vec<HADec>,
}

impl Observation {
    /// Bundle a time series table with its beam position table.
    ///
    /// # Errors
    ///
    /// Fails if the time series has no `time` column, or the position table
    /// has no `ha` or `dec` column.
    pub fn new(
        task_id: &str,
        data: ColumnTable,
        positions: &ColumnTable,
    ) -> Result<Self, ObservationError> {
        let require = |table: &ColumnTable, column: &str| -> Result<Vec<f64>, ObservationError> {
            table
                .column(column)
                .map(<[f64]>::to_vec)
                .ok_or_else(|| ObservationError::MissingColumn {
                    task_id: task_id.to_string(),
                    column: column.to_string(),
                })
        };
        let times_mjd_s = require(&data, TIME_COLUMN)?;
        let has = require(positions, HA_COLUMN)?;
        let decs = require(positions, DEC_COLUMN)?;
        let beam_hadec = has
            .into_iter()
            .zip(decs)
            .map(|(ha, dec)| HADec::from_radians(ha, dec))
            .collect();
        Ok(Self {
            task_id: task_id.to_string(),
            times_mjd_s,
            data,
            beam_hadec,
        })
    }

    pub fn num_beams(&self) -> usize {
        self.beam_hadec.len()
    }

    pub fn num_times(&self) -> usize {
        self.times_mjd_s.len()
    }

    /// # Errors
    ///
    /// Fails if the position table has no row for `beam`.
    pub fn beam_hadec(&self, beam: usize) -> Result<HADec, ObservationError> {
        self.beam_hadec
            .get(beam)
            .copied()
            .ok_or_else(|| ObservationError::MissingBeam {
                task_id: self.task_id.clone(),
                beam,
                num_beams: self.num_beams(),
            })
    }

    /// # Errors
    ///
    /// Fails if there's no such column.
    pub fn column(&self, name: &str) -> Result<&[f64], ObservationError> {
        self.data
            .column(name)
            .ok_or_else(|| ObservationError::MissingColumn {
                task_id: self.task_id.clone(),
                column: name.to_string(),
            })
    }

    /// A column with its median removed, so that the receiver baseline of
    /// each session drops out before sessions are pooled.
    ///
    /// # Errors
    ///
    /// Fails if there's no such column.
    pub fn median_subtracted(&self, name: &str) -> Result<Vec<f64>, ObservationError> {
        let column = self.column(name)?;
        let median = nan_median(column);
        Ok(column.iter().map(|v| v - median).collect())
    }
}
