//! Reading the per-observation csv tables.

use std::{
    fs,
    path::{Path, PathBuf},
};

use log::{debug, trace};

use super::error::IOError;
use crate::observation::{ColumnTable, Observation};

/// Location of the auto-correlation time series of a task.
pub fn data_table_path(basedir: &Path, task_id: &str) -> PathBuf {
    basedir
        .join(task_id)
        .join(format!("{}_exported_data_frequency_split.csv", task_id))
}

/// Location of the beam position table of a task.
pub fn position_table_path(basedir: &Path, task_id: &str) -> PathBuf {
    basedir.join(task_id).join(format!("{}_hadec.csv", task_id))
}

fn parse_cell(text: &str) -> Option<f64> {
    // an empty cell is a missing value
    if text.is_empty() {
        Some(f64::NAN)
    } else {
        text.parse::<f64>().ok()
    }
}

/// Read a csv file with a header row into numeric columns. Empty cells are
/// NaN. An unnamed leading index column is kept under the empty name.
///
/// # Errors
///
/// Fails if the file can't be read, rows differ in length, or a cell isn't
/// a number.
pub fn read_csv_table(path: &Path) -> Result<ColumnTable, IOError> {
    let csv_error = |csv_error: csv::Error| IOError::Csv {
        csv_error,
        path: path.to_path_buf(),
        source_file: file!(),
        source_line: line!(),
    };
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_error)?;
    let names: Vec<String> = reader
        .headers()
        .map_err(csv_error)?
        .iter()
        .map(str::to_string)
        .collect();

    let mut columns: Vec<Vec<f64>> = vec![vec![]; names.len()];
    for (row_idx, record) in reader.records().enumerate() {
        let record = record.map_err(csv_error)?;
        for ((column, name), text) in columns.iter_mut().zip(&names).zip(record.iter()) {
            let value = parse_cell(text).ok_or_else(|| IOError::BadValue {
                path: path.to_path_buf(),
                row: row_idx + 1,
                column: name.clone(),
                value: text.to_string(),
            })?;
            column.push(value);
        }
    }
    trace!(
        "read {} columns x {} rows from {}",
        names.len(),
        columns.first().map_or(0, Vec::len),
        path.display()
    );
    Ok(ColumnTable::new(names, columns)?)
}

/// Load the time series and beam positions of a task from `basedir`.
///
/// # Errors
///
/// Fails if either table can't be read, or lacks its required columns.
pub fn load_observation(basedir: &Path, task_id: &str) -> Result<Observation, IOError> {
    let data = read_csv_table(&data_table_path(basedir, task_id))?;
    let positions = read_csv_table(&position_table_path(basedir, task_id))?;
    let observation = Observation::new(task_id, data, &positions)?;
    debug!(
        "loaded task {}: {} timestamps, {} beam positions",
        task_id,
        observation.num_times(),
        observation.num_beams()
    );
    Ok(observation)
}

/// Read a list of task ids, one per line. Blank lines are skipped.
///
/// # Errors
///
/// Fails if the file can't be read.
pub fn read_task_ids(path: &Path) -> Result<Vec<String>, IOError> {
    let contents = fs::read_to_string(path).map_err(|io_error| IOError::Io {
        io_error,
        path: path.to_path_buf(),
    })?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}
