//! Projection of drift scan timestamps into calibrator-relative sky offsets.
//!
//! During a drift scan the telescope is parked and the calibrator drifts
//! through each compound beam. For every timestamp the hour angle of the
//! calibrator, relative to the hour angle the beam points at, gives the
//! east-west offset of the beam from the source. The north-south offset is
//! fixed per scan by the declination the beam points at.

use std::f64::consts::TAU;

use crate::{
    pos::{epoch_from_mjd_seconds, get_last, CalibratorContext},
    marlu::HADec,
};

/// Wrap an hour angle offset \[degrees\] into (-180, 180].
///
/// ```rust
/// use driftcube::offsets::wrap_hour_angle_deg;
///
/// assert_eq!(wrap_hour_angle_deg(190.0), -170.0);
/// assert_eq!(wrap_hour_angle_deg(-180.0), 180.0);
/// ```
pub fn wrap_hour_angle_deg(angle_deg: f64) -> f64 {
    let wrapped = (angle_deg + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped <= -180.0 {
        wrapped + 360.0
    } else {
        wrapped
    }
}

/// A single sample position in the calibrator-relative offset frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SkyOffset {
    /// Hour angle offset projected onto the sky, dHA·cos(dec) \[degrees\]
    pub dha_phys_deg: f64,
    /// Declination the beam points at \[degrees\]
    pub dec_deg: f64,
}

/// The sky offset of a beam pointing at `beam_hadec` when the calibrator
/// has hour angle `ha_cal_rad`.
pub fn sky_offset(ha_cal_rad: f64, beam_hadec: HADec) -> SkyOffset {
    // a full turn is added before wrapping, so that the transit
    // discontinuity never reaches the wrap boundary
    let dha_sky_deg = wrap_hour_angle_deg((ha_cal_rad - beam_hadec.ha + TAU).to_degrees());
    SkyOffset {
        dha_phys_deg: dha_sky_deg * beam_hadec.dec.cos(),
        dec_deg: beam_hadec.dec.to_degrees(),
    }
}

/// Compute the sky offset of a beam for every timestamp (MJD seconds) of an
/// observation.
pub fn sky_offsets(
    calibrator: &CalibratorContext,
    times_mjd_s: &[f64],
    beam_hadec: HADec,
) -> Vec<SkyOffset> {
    let longitude_rad = calibrator.array_pos.longitude_rad;
    times_mjd_s
        .iter()
        .map(|&time| {
            let last = get_last(epoch_from_mjd_seconds(time), longitude_rad);
            let ha_cal = last - calibrator.radec_apparent.ra;
            sky_offset(ha_cal, beam_hadec)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        marlu::{hifitime::Epoch, RADec},
        pos::{epoch_from_mjd_seconds, get_last, westerbork},
    };
    use approx::assert_abs_diff_eq;
    use float_cmp::approx_eq;

    #[test]
    fn wrap_straddles_boundary() {
        assert_abs_diff_eq!(wrap_hour_angle_deg(190.0), -170.0, epsilon = 1e-12);
        assert_abs_diff_eq!(wrap_hour_angle_deg(170.0), 170.0, epsilon = 1e-12);
        assert_abs_diff_eq!(wrap_hour_angle_deg(180.0), 180.0, epsilon = 1e-12);
        assert_abs_diff_eq!(wrap_hour_angle_deg(-180.0), 180.0, epsilon = 1e-12);
        assert_abs_diff_eq!(wrap_hour_angle_deg(-190.0), 170.0, epsilon = 1e-12);
        assert_abs_diff_eq!(wrap_hour_angle_deg(360.0 + 5.0), 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(wrap_hour_angle_deg(720.0 - 5.0), -5.0, epsilon = 1e-12);
        assert!(approx_eq!(f64, wrap_hour_angle_deg(540.0), 180.0, ulps = 2));
    }

    #[test]
    fn wrap_range_is_half_open() {
        for step in -3600..=3600 {
            let wrapped = wrap_hour_angle_deg(step as f64 * 0.25);
            assert!(wrapped > -180.0 && wrapped <= 180.0, "{wrapped}");
        }
    }

    #[test]
    fn offset_is_scaled_by_cos_dec() {
        let beam = HADec::from_radians(0.0, 60_f64.to_radians());
        let offset = sky_offset(2_f64.to_radians(), beam);
        assert_abs_diff_eq!(offset.dha_phys_deg, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(offset.dec_deg, 60.0, epsilon = 1e-12);
    }

    #[test]
    fn offset_wraps_across_transit() {
        let beam = HADec::from_radians(350_f64.to_radians(), 0.0);
        let offset = sky_offset(5_f64.to_radians(), beam);
        assert_abs_diff_eq!(offset.dha_phys_deg, 15.0, epsilon = 1e-9);
        let offset = sky_offset(340_f64.to_radians(), HADec::from_radians(-10_f64.to_radians(), 0.0));
        assert_abs_diff_eq!(offset.dha_phys_deg, -10.0, epsilon = 1e-9);
    }

    #[test]
    fn calibrator_transit_is_zero_offset() {
        let epoch = Epoch::from_mjd_utc(58_545.0);
        let calibrator =
            CalibratorContext::new("Test", RADec::from_degrees(0.0, 30.0), epoch, westerbork());
        // choose a time where the local apparent sidereal time equals the
        // calibrator's apparent right ascension
        let site_rad = westerbork().longitude_rad;
        let target_deg = calibrator.radec_apparent.ra.to_degrees();
        let mut mjd = 58_545.0;
        for _ in 0..8 {
            let last = get_last(epoch_from_mjd_seconds(mjd * 86400.0), site_rad).to_degrees();
            let diff = wrap_hour_angle_deg(target_deg - last);
            mjd += diff / 360.985_647_366_29;
        }
        let times = [mjd * 86400.0, mjd * 86400.0 + 240.0];
        let offsets = sky_offsets(&calibrator, &times, HADec::from_radians(0.0, 0.5));
        assert_abs_diff_eq!(offsets[0].dha_phys_deg, 0.0, epsilon = 1e-4);
        // four minutes later the source has moved about one degree west
        assert_abs_diff_eq!(
            offsets[1].dha_phys_deg,
            240.0 * 360.985_647 / 86400.0 * 0.5_f64.cos(),
            epsilon = 1e-4
        );
        assert_abs_diff_eq!(offsets[1].dec_deg, 0.5_f64.to_degrees(), epsilon = 1e-12);
    }
}
