use driftcube::{
    cli::{main_with_args, DriftContext},
    marlu::fitsio::FitsFile,
};
use std::{path::Path, sync::atomic::AtomicBool};
use tempfile::tempdir;

mod common;
use common::{write_drift_scan, write_task_ids};

fn args<'a>(tasks: &'a str, basedir: &'a str, out_dir: &'a str) -> Vec<&'a str> {
    #[rustfmt::skip]
    let args = vec![
        "driftcube",
        "-f", tasks,
        "-o", basedir,
        "-b", "0,1",
        "-a", "0,1",
        "-n", "2",
        "-d", "190303",
        "--out-dir", out_dir,
        "--no-draw-progress",
    ];
    args
}

fn cube_path(out_dir: &Path, antenna: usize, beam: usize, product: &str) -> std::path::PathBuf {
    out_dir
        .join("190303")
        .join(format!("ant_{}", antenna))
        .join(format!("CygA_190303_{:02}_ant{}_{}.fits", beam, antenna, product))
}

#[test]
fn test_drift_scans_to_cubes() {
    let tmp_dir = tempdir().unwrap();
    let basedir = tmp_dir.path().join("driftscans");
    let out_dir = tmp_dir.path().join("out");
    write_drift_scan(&basedir, "190303001", -0.1);
    write_drift_scan(&basedir, "190303002", 0.1);
    let tasks = tmp_dir.path().join("tasks.txt");
    // the third task has no tables, and is skipped
    write_task_ids(&tasks, &["190303001", "190303002", "190303003"]);

    let args = args(
        tasks.to_str().unwrap(),
        basedir.to_str().unwrap(),
        out_dir.to_str().unwrap(),
    );
    assert_eq!(main_with_args(&args), 0);

    for antenna in 0..2 {
        for beam in 0..2 {
            for product in ["xx", "yy", "I", "diff"] {
                assert!(cube_path(&out_dir, antenna, beam, product).exists());
            }
            assert!(!cube_path(&out_dir, antenna, beam, "db_xx").exists());
        }
    }

    let mut fptr = FitsFile::open(cube_path(&out_dir, 1, 0, "xx")).unwrap();
    let hdu = fptr.primary_hdu().unwrap();
    let ctype3: String = hdu.read_key(&mut fptr, "CTYPE3").unwrap();
    assert_eq!(ctype3, "FREQ");
    let crval3: f64 = hdu.read_key(&mut fptr, "CRVAL3").unwrap();
    assert!((crval3 - 1_299_345_884.0).abs() < 1.0);
    let cdelt3: f64 = hdu.read_key(&mut fptr, "CDELT3").unwrap();
    assert!((cdelt3 - 12.207e6).abs() < 1.0);
    let crval2: f64 = hdu.read_key(&mut fptr, "CRVAL2").unwrap();
    assert!((crval2 - 40.8).abs() < 0.2);
    let pixels: Vec<f64> = hdu.read_image(&mut fptr).unwrap();
    let peak = pixels
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(f64::NEG_INFINITY, f64::max);
    assert!(peak >= 1.0 - 1e-9);
}

#[test]
fn test_dry_run_writes_nothing() {
    let tmp_dir = tempdir().unwrap();
    let basedir = tmp_dir.path().join("driftscans");
    let out_dir = tmp_dir.path().join("out");
    write_drift_scan(&basedir, "190303001", -0.1);
    let tasks = tmp_dir.path().join("tasks.txt");
    write_task_ids(&tasks, &["190303001"]);

    let mut args = args(
        tasks.to_str().unwrap(),
        basedir.to_str().unwrap(),
        out_dir.to_str().unwrap(),
    );
    args.push("--dry-run");
    assert_eq!(main_with_args(&args), 0);
    assert!(!out_dir.exists());
}

#[test]
fn test_no_loadable_tasks_fails() {
    let tmp_dir = tempdir().unwrap();
    let tasks = tmp_dir.path().join("tasks.txt");
    write_task_ids(&tasks, &["190303001", "190303002"]);
    let basedir = tmp_dir.path().join("empty");
    let out_dir = tmp_dir.path().join("out");
    let args = args(
        tasks.to_str().unwrap(),
        basedir.to_str().unwrap(),
        out_dir.to_str().unwrap(),
    );
    assert_eq!(main_with_args(&args), 1);
}

#[test]
fn test_single_scan_is_incomplete() {
    let tmp_dir = tempdir().unwrap();
    let basedir = tmp_dir.path().join("driftscans");
    let out_dir = tmp_dir.path().join("out");
    write_drift_scan(&basedir, "190303001", 0.0);
    let tasks = tmp_dir.path().join("tasks.txt");
    write_task_ids(&tasks, &["190303001"]);
    let args = args(
        tasks.to_str().unwrap(),
        basedir.to_str().unwrap(),
        out_dir.to_str().unwrap(),
    );
    // one scan is a single line of samples, which can't be gridded
    assert_eq!(main_with_args(&args), 2);
    assert!(!cube_path(&out_dir, 0, 0, "xx").exists());
}

#[test]
fn test_cancelled_run_writes_nothing() {
    let tmp_dir = tempdir().unwrap();
    let basedir = tmp_dir.path().join("driftscans");
    let out_dir = tmp_dir.path().join("out");
    write_drift_scan(&basedir, "190303001", -0.1);
    write_drift_scan(&basedir, "190303002", 0.1);
    let tasks = tmp_dir.path().join("tasks.txt");
    write_task_ids(&tasks, &["190303001", "190303002"]);
    let args = args(
        tasks.to_str().unwrap(),
        basedir.to_str().unwrap(),
        out_dir.to_str().unwrap(),
    );

    let drift_ctx = DriftContext::from_args(&args).unwrap();
    let report = drift_ctx.run_with_cancel(&AtomicBool::new(true)).unwrap();
    assert!(report.cancelled);
    assert!(!report.is_complete());
    assert_eq!(report.num_written(), 0);
    assert!(!cube_path(&out_dir, 0, 0, "xx").exists());
}
