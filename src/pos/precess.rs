// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Precession of catalogue positions to the mean equinox of an epoch.

use crate::marlu::{
    erfa::{
        constants::ERFA_DJM0,
        misc::norm_angle,
        prenut::precession_matrix_06,
        time::julian_date_to_epoch,
        transform::{cartesian_to_spherical, spherical_to_cartesian},
        vectors_and_matrices::mat_mul_pvec,
    },
    hifitime::Epoch,
    RADec,
};

/// The Julian epoch (e.g. 2019.17) of an [`Epoch`].
pub fn julian_epoch(epoch: Epoch) -> f64 {
    julian_date_to_epoch(ERFA_DJM0, epoch.to_mjd_tt_days())
}

/// Precess a J2000 position to the mean equator and equinox of `epoch`, with
/// the IAU 2006 bias-precession matrix.
pub fn precess_from_j2000(radec_j2000: RADec, epoch: Epoch) -> RADec {
    let rbp = precession_matrix_06(ERFA_DJM0, epoch.to_mjd_tt_days());
    let direction = spherical_to_cartesian(radec_j2000.ra, radec_j2000.dec);
    let (ra, dec) = cartesian_to_spherical(mat_mul_pvec(rbp, direction));
    RADec::from_radians(norm_angle(ra), dec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::SECONDS_PER_DAY;
    use approx::assert_abs_diff_eq;

    /// 2000 January 1.5 TT
    fn j2000() -> Epoch {
        Epoch::from_mjd_utc(51_544.5 - 64.184 / SECONDS_PER_DAY)
    }

    #[test]
    fn only_frame_bias_at_j2000() {
        let radec = RADec::from_degrees(299.868_154, 40.733_917);
        let precessed = precess_from_j2000(radec, j2000());
        // the frame bias is tens of milliarcseconds
        assert_abs_diff_eq!(precessed.ra, radec.ra, epsilon = 5e-7);
        assert_abs_diff_eq!(precessed.dec, radec.dec, epsilon = 5e-7);
    }

    #[test]
    fn precession_of_origin_over_half_century() {
        // Over 50 years the origin moves by roughly zeta + z in RA and theta in Dec.
        let epoch = Epoch::from_mjd_utc(51_544.5 + 50.0 * 365.25);
        let precessed = precess_from_j2000(RADec::from_degrees(0.0, 0.0), epoch);
        assert_abs_diff_eq!(precessed.ra.to_degrees(), 0.640_718, epsilon = 1e-4);
        assert_abs_diff_eq!(precessed.dec.to_degrees(), 0.278_341, epsilon = 1e-4);
    }

    #[test]
    fn ra_stays_in_range() {
        // just west of the origin, precession carries the position across 0h
        let epoch = Epoch::from_mjd_utc(51_544.5 + 50.0 * 365.25);
        let precessed = precess_from_j2000(RADec::from_degrees(359.9, 0.0), epoch);
        assert!((0.0..std::f64::consts::TAU).contains(&precessed.ra));
        assert_abs_diff_eq!(precessed.ra.to_degrees(), 0.540_718, epsilon = 1e-3);
    }

    #[test]
    fn julian_epoch_of_j2000() {
        assert_abs_diff_eq!(julian_epoch(j2000()), 2000.0, epsilon = 1e-9);
        let epoch = Epoch::from_mjd_utc(51_544.5 + 365.25 * 19.5);
        assert_abs_diff_eq!(julian_epoch(epoch), 2019.5, epsilon = 1e-5);
    }
}
