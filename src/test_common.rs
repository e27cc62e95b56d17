//! Synthetic drift scans, and helpers shared by the tests.

use std::sync::Mutex;

use crate::{
    cube::{BeamCube, Polarisation},
    io::{error::IOError, CubeKey, CubeSink},
    marlu::HADec,
    observation::{column_name, ColumnTable, Observation, DEC_COLUMN, HA_COLUMN, TIME_COLUMN},
    offsets::sky_offsets,
    pos::{epoch_from_mjd_seconds, get_last, CalibratorContext},
};

/// Two drift scans from the 3rd of March 2019.
pub const TEST_TASK_IDS: [&str; 2] = ["190303001", "190303002"];

pub fn cyg_a_calibrator() -> CalibratorContext {
    CalibratorContext::from_task_id("Cyg A", None, TEST_TASK_IDS[0]).unwrap()
}

/// The calibrator as a Gaussian on a constant background, seen through every
/// beam of a parked array.
#[derive(Clone, Debug)]
pub struct DriftScan {
    pub num_beams: usize,
    pub antennas: Vec<Option<usize>>,
    pub num_bins: usize,
    pub num_times: usize,
    pub time_step_s: f64,
    /// The calibrator crosses beam 0 at this time
    pub mid_time_mjd_s: f64,
    /// Gaussian sigma \[degrees\]
    pub width_deg: f64,
    /// Peak of the xx and yy profiles
    pub scale: [f64; 2],
}

impl Default for DriftScan {
    fn default() -> Self {
        Self {
            num_beams: 2,
            antennas: vec![Some(0), Some(1)],
            num_bins: 2,
            num_times: 121,
            time_step_s: 10.0,
            mid_time_mjd_s: 58545.9 * 86400.0,
            width_deg: 0.3,
            scale: [10.0, 6.0],
        }
    }
}

impl DriftScan {
    /// The time series and position tables of a scan with every beam
    /// pointed `dec_offset_deg` from the calibrator. Beam `b` points `b / 2`
    /// degrees further west than beam 0.
    pub fn tables(
        &self,
        calibrator: &CalibratorContext,
        dec_offset_deg: f64,
    ) -> (ColumnTable, ColumnTable) {
        let longitude_rad = calibrator.array_pos.longitude_rad;
        let ha_cal = |time: f64| {
            get_last(epoch_from_mjd_seconds(time), longitude_rad) - calibrator.radec_apparent.ra
        };
        let times: Vec<f64> = (0..self.num_times)
            .map(|idx| {
                self.mid_time_mjd_s
                    + (idx as f64 - (self.num_times / 2) as f64) * self.time_step_s
            })
            .collect();
        let cal_dec_deg = calibrator.radec_apparent.dec.to_degrees();
        let beam_hadec: Vec<HADec> = (0..self.num_beams)
            .map(|beam| {
                HADec::from_radians(
                    ha_cal(self.mid_time_mjd_s) + (0.5 * beam as f64).to_radians(),
                    (cal_dec_deg + dec_offset_deg).to_radians(),
                )
            })
            .collect();

        let mut names = vec!["".to_string(), TIME_COLUMN.to_string()];
        let mut columns = vec![(0..self.num_times).map(|idx| idx as f64).collect(), times.clone()];
        for (beam, &hadec) in beam_hadec.iter().enumerate() {
            let two_var = 2.0 * self.width_deg * self.width_deg;
            let profile: Vec<f64> = sky_offsets(calibrator, &times, hadec)
                .iter()
                .map(|offset| {
                    let dy = offset.dec_deg - cal_dec_deg;
                    (-(offset.dha_phys_deg.powi(2) + dy * dy) / two_var).exp()
                })
                .collect();
            for &antenna in &self.antennas {
                for bin in 0..self.num_bins {
                    for (pol, scale) in Polarisation::ALL.into_iter().zip(self.scale) {
                        names.push(column_name(beam, bin, pol, antenna));
                        // a receiver baseline which median subtraction removes
                        let baseline = 100.0 + bin as f64;
                        columns.push(profile.iter().map(|p| scale * p + baseline).collect());
                    }
                }
            }
        }
        let data = ColumnTable::new(names, columns).unwrap();
        let positions = ColumnTable::new(
            vec!["".into(), HA_COLUMN.into(), DEC_COLUMN.into()],
            vec![
                (0..self.num_beams).map(|beam| beam as f64).collect(),
                beam_hadec.iter().map(|hadec| hadec.ha).collect(),
                beam_hadec.iter().map(|hadec| hadec.dec).collect(),
            ],
        )
        .unwrap();
        (data, positions)
    }

    pub fn observation(
        &self,
        task_id: &str,
        calibrator: &CalibratorContext,
        dec_offset_deg: f64,
    ) -> Observation {
        let (data, positions) = self.tables(calibrator, dec_offset_deg);
        Observation::new(task_id, data, &positions).unwrap()
    }
}

/// Keeps every cube it is given.
#[derive(Default)]
pub struct MemorySink {
    cubes: Mutex<Vec<(CubeKey, BeamCube)>>,
}

impl MemorySink {
    pub fn cubes(&self) -> Vec<(CubeKey, BeamCube)> {
        self.cubes.lock().unwrap().clone()
    }

    pub fn get(&self, key: CubeKey) -> Option<BeamCube> {
        self.cubes
            .lock()
            .unwrap()
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, cube)| cube.clone())
    }
}

impl CubeSink for MemorySink {
    fn write_cube(&self, key: CubeKey, cube: &BeamCube) -> Result<(), IOError> {
        self.cubes.lock().unwrap().push((key, cube.clone()));
        Ok(())
    }
}
