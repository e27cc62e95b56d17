// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Positional astronomy: sidereal time, precession and calibrator positions.

pub mod calibrator;
pub mod error;
pub mod precess;
pub mod sidereal;

// Re-exports.
pub use calibrator::{lookup_calibrator, task_id_to_epoch, westerbork, CalibratorContext};
pub use error::PosError;
pub use precess::{julian_epoch, precess_from_j2000};
pub use sidereal::{epoch_from_mjd_seconds, get_gast, get_last};
