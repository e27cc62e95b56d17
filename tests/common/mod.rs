//! Writes synthetic drift scan tables in the layout driftcube reads.

use std::{fs, path::Path};

use driftcube::{
    cube::Polarisation,
    marlu::HADec,
    observation::column_name,
    offsets::sky_offsets,
    pos::{epoch_from_mjd_seconds, get_last, CalibratorContext},
};

pub const NUM_TIMES: usize = 121;
pub const NUM_BEAMS: usize = 2;
pub const NUM_ANTENNAS: usize = 2;
pub const NUM_BINS: usize = 2;

/// Write the time series and beam positions of a scan of Cyg A, with every
/// beam `dec_offset_deg` away from the calibrator.
pub fn write_drift_scan(basedir: &Path, task_id: &str, dec_offset_deg: f64) {
    let calibrator = CalibratorContext::from_task_id("Cyg A", None, task_id).unwrap();
    let longitude_rad = calibrator.array_pos.longitude_rad;
    let mid_time = 58545.9 * 86400.0;
    let times: Vec<f64> = (0..NUM_TIMES)
        .map(|idx| mid_time + (idx as f64 - (NUM_TIMES / 2) as f64) * 10.0)
        .collect();
    let ha_mid = get_last(epoch_from_mjd_seconds(mid_time), longitude_rad)
        - calibrator.radec_apparent.ra;
    let cal_dec_deg = calibrator.radec_apparent.dec.to_degrees();
    let beam_hadec: Vec<HADec> = (0..NUM_BEAMS)
        .map(|beam| {
            HADec::from_radians(
                ha_mid + (0.5 * beam as f64).to_radians(),
                (cal_dec_deg + dec_offset_deg).to_radians(),
            )
        })
        .collect();

    let task_dir = basedir.join(task_id);
    fs::create_dir_all(&task_dir).unwrap();

    let mut header = vec!["".to_string(), "time".to_string()];
    let mut columns = vec![(0..NUM_TIMES).map(|idx| idx as f64).collect(), times.clone()];
    for (beam, &hadec) in beam_hadec.iter().enumerate() {
        let profile: Vec<f64> = sky_offsets(&calibrator, &times, hadec)
            .iter()
            .map(|offset| {
                let dy = offset.dec_deg - cal_dec_deg;
                (-(offset.dha_phys_deg.powi(2) + dy * dy) / 0.18).exp()
            })
            .collect();
        for antenna in 0..NUM_ANTENNAS {
            for bin in 0..NUM_BINS {
                for (pol, scale) in Polarisation::ALL.into_iter().zip([10.0, 6.0]) {
                    header.push(column_name(beam, bin, pol, Some(antenna)));
                    columns.push(profile.iter().map(|p| scale * p + 50.0).collect());
                }
            }
        }
    }
    let mut writer = csv::Writer::from_path(
        task_dir.join(format!("{}_exported_data_frequency_split.csv", task_id)),
    )
    .unwrap();
    writer.write_record(&header).unwrap();
    for row in 0..NUM_TIMES {
        writer
            .write_record(columns.iter().map(|column: &Vec<f64>| column[row].to_string()))
            .unwrap();
    }
    writer.flush().unwrap();

    let mut writer =
        csv::Writer::from_path(task_dir.join(format!("{}_hadec.csv", task_id))).unwrap();
    writer.write_record(["", "ha", "dec"]).unwrap();
    for (beam, hadec) in beam_hadec.iter().enumerate() {
        writer
            .write_record([beam.to_string(), hadec.ha.to_string(), hadec.dec.to_string()])
            .unwrap();
    }
    writer.flush().unwrap();
}

/// Write a task id list.
pub fn write_task_ids(path: &Path, task_ids: &[&str]) {
    fs::write(path, task_ids.join("\n")).unwrap();
}
