// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Calibrator positions, and the per-run context built from them.

use std::fmt::Display;

use lazy_static::lazy_static;
use log::debug;
use regex::Regex;

use super::{
    error::PosError,
    precess::{julian_epoch, precess_from_j2000},
};
use crate::{
    constants::{WSRT_HEIGHT_METRES, WSRT_LATITUDE_RADIANS, WSRT_LONGITUDE_RADIANS},
    marlu::{hifitime::Epoch, LatLngHeight, RADec},
};

/// Well known drift scan calibrators and their J2000 positions in degrees.
///
/// Names are matched case-insensitively with whitespace removed, so
/// "Cyg A", "CygA" and "cyga" are all the same source.
const CALIBRATOR_CATALOGUE: &[(&str, &[&str], f64, f64)] = &[
    ("Cyg A", &["3C405"], 299.868_154, 40.733_917),
    ("Cas A", &["3C461"], 350.850_000, 58.815_000),
    ("Tau A", &["3C144", "M1"], 83.633_083, 22.014_500),
    ("Vir A", &["3C274", "M87"], 187.705_917, 12.391_111),
    ("3C147", &[], 85.650_575, 49.852_008),
    ("3C286", &[], 202.784_533, 30.509_156),
    ("3C48", &[], 24.422_083, 33.159_750),
    ("3C138", &[], 80.291_192, 16.639_458),
    ("3C196", &[], 123.400_140, 48.217_370),
    ("3C295", &[], 212.835_000, 52.202_778),
];

lazy_static! {
    static ref RE_TASK_ID: Regex = Regex::new(r"^\s*(\d{2})(\d{2})(\d{2})\d*\s*$").unwrap();
}

fn normalise_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Look up the J2000 position of a calibrator by name.
///
/// # Errors
///
/// Returns [`PosError::UnknownCalibrator`] if the name isn't in the catalogue.
pub fn lookup_calibrator(name: &str) -> Result<RADec, PosError> {
    let wanted = normalise_name(name);
    CALIBRATOR_CATALOGUE
        .iter()
        .find(|(primary, aliases, ..)| {
            normalise_name(primary) == wanted
                || aliases.iter().any(|alias| normalise_name(alias) == wanted)
        })
        .map(|&(_, _, ra_deg, dec_deg)| RADec::from_degrees(ra_deg, dec_deg))
        .ok_or_else(|| PosError::UnknownCalibrator {
            name: name.to_string(),
            known: CALIBRATOR_CATALOGUE
                .iter()
                .map(|(primary, ..)| *primary)
                .collect::<Vec<_>>()
                .join(", "),
        })
}

/// The date encoded in the first six digits (`YYMMDD`) of a task id, at
/// midnight UTC.
///
/// # Errors
///
/// Returns [`PosError::BadTaskId`] if the task id doesn't start with a valid
/// date.
pub fn task_id_to_epoch(task_id: &str) -> Result<Epoch, PosError> {
    let bad_task_id = || PosError::BadTaskId {
        source_file: file!(),
        source_line: line!(),
        task_id: task_id.to_string(),
    };
    let captures = RE_TASK_ID.captures(task_id).ok_or_else(bad_task_id)?;
    let field = |idx: usize| -> Result<u8, PosError> {
        captures[idx].parse::<u8>().map_err(|_| bad_task_id())
    };
    let (year, month, day) = (field(1)?, field(2)?, field(3)?);
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return Err(bad_task_id());
    }
    Ok(Epoch::from_gregorian_utc_at_midnight(
        2000 + i32::from(year),
        month,
        day,
    ))
}

/// Everything the coordinate transform needs to know about the calibrator
/// and the site, resolved once per run and shared read-only.
#[derive(Clone, Debug)]
pub struct CalibratorContext {
    /// Calibrator name, as given by the user
    pub name: String,
    /// Catalogue (J2000) position
    pub radec_j2000: RADec,
    /// Position precessed to the mean equinox of the observing epoch
    pub radec_apparent: RADec,
    /// The epoch the apparent position was computed for
    pub epoch: Epoch,
    /// Site of the telescope
    pub array_pos: LatLngHeight,
}

impl CalibratorContext {
    /// Precess `radec_j2000` to `epoch` and bundle it with the site position.
    pub fn new(
        name: &str,
        radec_j2000: RADec,
        epoch: Epoch,
        array_pos: LatLngHeight,
    ) -> CalibratorContext {
        let radec_apparent = precess_from_j2000(radec_j2000, epoch);
        debug!(
            "calibrator {} J2000 {} -> apparent {} (J{:.4})",
            name,
            radec_j2000,
            radec_apparent,
            julian_epoch(epoch)
        );
        CalibratorContext {
            name: name.to_string(),
            radec_j2000,
            radec_apparent,
            epoch,
            array_pos,
        }
    }

    /// Resolve a calibrator by name (or an explicit J2000 position) for the
    /// date of the first task id in a batch, at Westerbork.
    ///
    /// # Errors
    ///
    /// Fails if the name is unknown and no position was given, or if the task
    /// id has no date.
    pub fn from_task_id(
        name: &str,
        radec_override: Option<RADec>,
        first_task_id: &str,
    ) -> Result<CalibratorContext, PosError> {
        let radec_j2000 = match radec_override {
            Some(radec) => radec,
            None => lookup_calibrator(name)?,
        };
        let epoch = task_id_to_epoch(first_task_id)?;
        Ok(CalibratorContext::new(
            name,
            radec_j2000,
            epoch,
            westerbork(),
        ))
    }

    /// The calibrator name without whitespace, as used in output filenames.
    pub fn file_label(&self) -> String {
        self.name.replace(' ', "")
    }
}

impl Display for CalibratorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} J2000 {}, apparent (J{:.4}) {}",
            self.name,
            self.radec_j2000,
            julian_epoch(self.epoch),
            self.radec_apparent
        )
    }
}

/// The position of the Westerbork Synthesis Radio Telescope.
pub fn westerbork() -> LatLngHeight {
    LatLngHeight {
        longitude_rad: WSRT_LONGITUDE_RADIANS,
        latitude_rad: WSRT_LATITUDE_RADIANS,
        height_metres: WSRT_HEIGHT_METRES,
    }
}
