#![warn(missing_debug_implementations)]
#![warn(clippy::missing_safety_doc)]
#![warn(clippy::missing_errors_doc)]

//! Driftcube turns drift scans of a bright calibrator, taken with the Apertif
//! phased array feeds on the Westerbork Synthesis Radio Telescope, into
//! models of the compound beams.
//!
//! While the dishes are parked the calibrator drifts through the beams. The
//! auto-correlations of each beam are projected into offsets from the
//! calibrator ([`offsets`]), pooled over several scans at different
//! declinations, resampled onto a regular grid ([`gridding`]) and stacked by
//! frequency into normalised cubes with a world coordinate system ([`cube`]).
//! [`pipeline`] does this for every antenna and beam.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::{path::PathBuf, sync::atomic::AtomicBool};
//!
//! use driftcube::{
//!     io::IOContext,
//!     pipeline::{BeamModelConfigBuilder, BeamModelPipeline},
//!     pos::CalibratorContext,
//! };
//!
//! let io_ctx = IOContext {
//!     task_ids: vec!["190303001".into(), "190303002".into()],
//!     basedir: PathBuf::from("/data/driftscans"),
//!     out_dir: PathBuf::from("/data/beams"),
//!     date_label: "190303".into(),
//!     write_db: false,
//! };
//! let (observations, _failures) = io_ctx.load_observations();
//! let calibrator = CalibratorContext::from_task_id("Cyg A", None, "190303001").unwrap();
//! let config = BeamModelConfigBuilder::default()
//!     .beams(vec![0, 1, 2])
//!     .build()
//!     .unwrap();
//!
//! let pipeline = BeamModelPipeline::new(&config, &calibrator, &observations).unwrap();
//! let writer = io_ctx.cube_writer(&calibrator.file_label());
//! let report = pipeline.run(&writer, &AtomicBool::new(false));
//! assert!(report.is_complete());
//! ```

use std::{collections::HashMap, sync::Mutex, time::Duration};

use lazy_static::lazy_static;

pub mod constants;
pub mod cube;
pub mod error;
pub use error::DriftError;
pub mod gridding;
pub mod io;
pub mod observation;
pub mod offsets;
pub mod pipeline;
pub mod pos;

#[cfg(feature = "cli")]
pub mod cli;

pub use marlu;
pub use marlu::ndarray;

#[cfg(test)]
pub mod test_common;

lazy_static! {
    #[doc(hidden)]
    pub static ref DURATIONS: Mutex<HashMap<String, Duration>> = Mutex::new(HashMap::new());
}

/// Time an expression, adding the time it took to the named running total.
#[macro_export]
macro_rules! with_increment_duration {
    ($name:expr, $e:expr) => {{
        let _now = std::time::Instant::now();
        let _res = $e;
        if let Ok(mut durations) = $crate::DURATIONS.lock() {
            *durations
                .entry(String::from($name))
                .or_insert(std::time::Duration::ZERO) += _now.elapsed();
        }
        _res
    }};
}

/// The running totals recorded by [`with_increment_duration`] so far.
pub fn get_durations() -> HashMap<String, Duration> {
    DURATIONS
        .lock()
        .map(|durations| durations.clone())
        .unwrap_or_default()
}
