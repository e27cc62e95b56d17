// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Sidereal time.
//!
//! The drift scan reduction needs the local *apparent* sidereal time at the
//! site, i.e. the mean sidereal time corrected by the equation of the
//! equinoxes. ERFA's IAU 2006/2000A Greenwich apparent sidereal time does
//! both.
//!
//! UT1 is taken to be UTC. Without Earth orientation data the DUT1 correction
//! is a fixed zero, which is off by at most 0.9 s of time.

use crate::{
    constants::SECONDS_PER_DAY,
    marlu::{
        erfa::{constants::ERFA_DJM0, misc::norm_angle, time::gst06a},
        hifitime::Epoch,
    },
};

/// Greenwich apparent sidereal time \[radians\] in the range [0, 2π).
pub fn get_gast(epoch: Epoch) -> f64 {
    let ut1 = epoch.to_mjd_utc_days();
    let tt = epoch.to_mjd_tt_days();
    gst06a(ERFA_DJM0, ut1, ERFA_DJM0, tt)
}

/// Local apparent sidereal time \[radians\] in the range [0, 2π) for an
/// [`Epoch`] at a site with the given east longitude.
pub fn get_last(epoch: Epoch, longitude_rad: f64) -> f64 {
    norm_angle(get_gast(epoch) + longitude_rad)
}

/// Convert a measurement set style timestamp (MJD seconds) into an [`Epoch`].
pub fn epoch_from_mjd_seconds(mjd_seconds: f64) -> Epoch {
    Epoch::from_mjd_utc(mjd_seconds / SECONDS_PER_DAY)
}
