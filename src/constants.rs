// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Useful constants.
//!
//! All constants *must* be double precision.

/// Westerbork Synthesis Radio Telescope longitude on Earth in radians (east +ve).
pub const WSRT_LONGITUDE_RADIANS: f64 = 0.115_250_024_628_642_37;
/// Westerbork Synthesis Radio Telescope latitude on Earth in radians.
pub const WSRT_LATITUDE_RADIANS: f64 = 0.923_536_435_836_744_3;
/// Westerbork Synthesis Radio Telescope height above sea level in metres.
pub const WSRT_HEIGHT_METRES: f64 = 16.0;

/// Default angular size of a beam model grid cell \[arcseconds\]
pub const DEFAULT_CELL_SIZE_ARCSEC: f64 = 100.0;

/// Default number of frequency bins in a beam model cube
pub const DEFAULT_NUM_FREQ_BINS: usize = 18;

/// Apertif correlator fine channel width \[Hz\]
pub const APERTIF_CHANNEL_WIDTH_HZ: f64 = 12.207e3;
/// Number of correlator channels averaged into one frequency bin
pub const APERTIF_CHANNELS_PER_BIN: usize = 1000;
/// Centre frequency of the full Apertif band \[Hz\]
pub const APERTIF_CENTRE_FREQ_HZ: f64 = 1370e6;
/// Total number of channels across the full Apertif band
pub const APERTIF_TOTAL_CHANNELS: usize = 24576;
/// Index of the first channel exported from the measurement sets
pub const APERTIF_FIRST_CHANNEL: usize = 6500;

/// Rest frequency of neutral hydrogen \[Hz\]
pub const HI_REST_FREQ_HZ: f64 = 1.420405752e9;

/// Number of compound beams in an Apertif observation
pub const NUM_BEAMS: usize = 40;
/// Number of dishes with auto-correlations exported
pub const NUM_ANTENNAS: usize = 12;

/// Seconds in a day
pub const SECONDS_PER_DAY: f64 = 86400.0;
/// Arcseconds per degree
pub const ARCSEC_PER_DEGREE: f64 = 3600.0;
