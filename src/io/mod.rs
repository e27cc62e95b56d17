//! Input and Ouput data file format modules

pub mod error;
pub mod fits;
pub mod table;

use std::path::PathBuf;

use log::{info, warn};

use crate::{cube::BeamCube, observation::Observation};

use self::error::IOError;
pub use self::{fits::FitsCubeWriter, table::load_observation};

/// Groups together parameters related to I/O
#[derive(Debug, Default, Clone)]
pub struct IOContext {
    // in
    /// Task ids of the drift scans to combine
    pub task_ids: Vec<String>,
    /// Directory holding one sub-directory of tables per task
    pub basedir: PathBuf,

    // out
    /// Root directory for beam cubes
    pub out_dir: PathBuf,
    /// Label of the output date directory and filenames
    pub date_label: String,
    /// Also write the decibel cubes
    pub write_db: bool,
}

impl IOContext {
    /// Load every task, skipping (with a warning) any whose tables can't be
    /// read. Observations are returned in task id order.
    pub fn load_observations(&self) -> (Vec<Observation>, Vec<(String, IOError)>) {
        let mut task_ids = self.task_ids.clone();
        task_ids.sort();
        let mut observations = vec![];
        let mut failures = vec![];
        for task_id in task_ids {
            match load_observation(&self.basedir, &task_id) {
                Ok(observation) => observations.push(observation),
                Err(err) => {
                    warn!("skipping task {}: {}", task_id, err);
                    failures.push((task_id, err));
                }
            }
        }
        info!(
            "loaded {} of {} observations",
            observations.len(),
            observations.len() + failures.len()
        );
        (observations, failures)
    }

    /// The FITS writer for this context's output layout.
    pub fn cube_writer(&self, calibrator_label: &str) -> FitsCubeWriter {
        FitsCubeWriter {
            out_dir: self.out_dir.clone(),
            date_label: self.date_label.clone(),
            calibrator_label: calibrator_label.to_string(),
            write_db: self.write_db,
        }
    }
}

/// Which beam model a cube is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CubeKey {
    /// `None` for a single dish layout
    pub antenna: Option<usize>,
    pub beam: usize,
}

/// Somewhere finished beam cubes can be handed off to.
pub trait CubeSink: Sync + Send {
    /// Persist all products of `cube`.
    ///
    /// # Errors
    ///
    /// Can throw [`IOError`] if there is an issue writing.
    fn write_cube(&self, key: CubeKey, cube: &BeamCube) -> Result<(), IOError>;
}
