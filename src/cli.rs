//! Command Line Interface helpers for driftcube

use std::{
    ffi::OsString,
    fmt::{Debug, Display},
    path::PathBuf,
    sync::atomic::AtomicBool,
    time::Duration,
};

use clap::{
    arg, command,
    ErrorKind::{ArgumentNotFound, DisplayHelp, DisplayVersion},
    ValueHint::{DirPath, FilePath},
};
use log::{debug, info, trace, warn};
use prettytable::{format as prettyformat, row, table};

use crate::{
    constants::NUM_BEAMS,
    cube::NormalisationScope,
    error::{
        CLIError::InvalidCommandLineArgument,
        DriftError::{self, ClapError, DryRun},
    },
    get_durations,
    io::{table::read_task_ids, IOContext},
    marlu::RADec,
    pipeline::{BeamModelConfig, BeamModelConfigBuilder, BeamModelPipeline, PipelineReport},
    pos::{task_id_to_epoch, CalibratorContext},
    with_increment_duration,
};

/// Everything needed to turn a batch of drift scans into beam models.
#[derive(Debug)]
pub struct DriftContext {
    /// The calibrator, precessed to the date of the first task
    pub calibrator: CalibratorContext,
    /// Which beam models to make, and how
    pub config: BeamModelConfig,
    /// Input / output paths
    pub io_ctx: IOContext,
}

// Add build-time information from the "built" crate.
include!(concat!(env!("OUT_DIR"), "/built.rs"));

/// Write many info-level log lines of how this executable was compiled.
///
/// # Errors
///
/// propagates writeln! fails
pub fn fmt_build_info(f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match (GIT_HEAD_REF, GIT_COMMIT_HASH) {
        (Some(hr), Some(hash)) => {
            let dirty = GIT_DIRTY.unwrap_or(false);
            writeln!(
                f,
                "Compiled on git commit hash: {}{}",
                hash,
                if dirty { " (dirty)" } else { "" }
            )?;
            writeln!(f, "            git head ref: {}", hr)?;
        }
        _ => writeln!(f, "Compiled on git commit hash: <no git info>")?,
    }
    writeln!(f, "            {}", BUILT_TIME_UTC)?;
    writeln!(f, "         with compiler {}", RUSTC_VERSION)?;
    writeln!(f)?;
    Ok(())
}

impl Display for DriftContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{} version {}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
        )?;

        fmt_build_info(f)?;

        writeln!(f, "Calibrator:           {}", &self.calibrator)?;
        writeln!(f, "Array position:       {}", &self.calibrator.array_pos)?;
        writeln!(f, "Base directory:       {}", self.io_ctx.basedir.display())?;
        writeln!(
            f,
            "Output:               {}",
            self.io_ctx.out_dir.join(&self.io_ctx.date_label).display()
        )?;

        let mut task_table = table!(["task id", "date"]);
        task_table.set_format(*prettyformat::consts::FORMAT_CLEAN);
        for task_id in &self.io_ctx.task_ids {
            let date = match task_id_to_epoch(task_id) {
                Ok(epoch) => {
                    let (y, mo, d, ..) = epoch.to_gregorian_utc();
                    format!("{:04}-{:02}-{:02}", y, mo, d)
                }
                Err(_) => "?".to_string(),
            };
            task_table.add_row(row![r => task_id, date]);
        }
        writeln!(
            f,
            "Drift scans ({}):\n{}",
            self.io_ctx.task_ids.len(),
            task_table
        )?;

        write!(f, "{}", &self.config)?;
        writeln!(
            f,
            "{} write decibel cubes.",
            if self.io_ctx.write_db {
                "Will"
            } else {
                "Will not"
            }
        )?;
        Ok(())
    }
}

/// Parse an inclusive range like `0,39` (or a single index like `7`).
fn parse_inclusive_range(option: &str, text: &str) -> Result<Vec<usize>, DriftError> {
    let invalid = || InvalidCommandLineArgument {
        option: option.to_string(),
        expected: "<FIRST>,<LAST> with FIRST <= LAST".to_string(),
        received: text.to_string(),
    };
    let bounds = text
        .split(',')
        .map(|bound| bound.trim().parse::<usize>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| invalid())?;
    match bounds[..] {
        [single] => Ok(vec![single]),
        [first, last] if first <= last => Ok((first..=last).collect()),
        _ => Err(invalid().into()),
    }
}

/// A summary of what was written for each antenna.
pub fn report_table(report: &PipelineReport) -> prettytable::Table {
    let mut outcome_table = table!(["antenna", "written", "failed", "error"]);
    outcome_table.set_format(*prettyformat::consts::FORMAT_CLEAN);
    for outcome in &report.outcomes {
        let failed: Vec<String> = outcome
            .failed
            .iter()
            .map(|(beam, _)| format!("{:02}", beam))
            .collect();
        outcome_table.add_row(row![r =>
            outcome.antenna.map_or_else(|| "-".to_string(), |antenna| antenna.to_string()),
            outcome.written.len(),
            failed.join(" "),
            outcome.error.as_ref().map_or_else(String::new, ToString::to_string)
        ]);
    }
    outcome_table
}

impl DriftContext {
    fn get_matches<I, T>(args: I) -> Result<clap::ArgMatches, DriftError>
    where
        I: IntoIterator<Item = T> + Debug,
        T: Into<OsString> + Clone,
    {
        let mut app = command!()
            .arg_required_else_help(true)
            .next_line_help(false)
            .about("Make cubes of Apertif compound beam models from drift scans of a calibrator.")
            .args(&[
                // input options
                arg!(-f --"task-ids" <PATH> "A file with a list of task ids, one per line")
                    .value_hint(FilePath)
                    .help_heading("INPUT"),
                arg!(-o --basedir <PATH> "Directory holding one sub-directory of tables per task")
                    .value_hint(DirPath)
                    .default_value("/tank/apertif/driftscans/")
                    .required(false)
                    .help_heading("INPUT"),

                // calibrator options
                arg!(-c --calibname <NAME> "The calibrator which was scanned")
                    .default_value("Cyg A")
                    .required(false)
                    .help_heading("CALIBRATOR"),
                arg!(--"calibrator-radec" "Use this J2000 position (degrees) instead of the catalogue")
                    .value_names(&["RA", "DEC"])
                    .allow_hyphen_values(true)
                    .required(false)
                    .help_heading("CALIBRATOR"),

                // selection options
                arg!(-b --beams <RANGE> "First and last beam to model")
                    .default_value("0,39")
                    .required(false)
                    .help_heading("SELECTION"),
                arg!(-a --antennas <RANGE> "First and last antenna to model")
                    .default_value("0,11")
                    .required(false)
                    .help_heading("SELECTION"),
                arg!(--"no-antenna-suffix" "Model the columns without an antenna suffix, as a single dish. Overrides --antennas")
                    .help_heading("SELECTION"),

                // gridding options
                arg!(-n --"bin-num" <BINS> "Number of frequency bins")
                    .default_value("18")
                    .required(false)
                    .help_heading("GRIDDING"),
                arg!(--"cell-size" <ARCSEC> "Grid cell size in arcseconds")
                    .default_value("100")
                    .required(false)
                    .help_heading("GRIDDING"),
                arg!(--"shared-normalisation" "Normalise xx and yy by the larger of their peaks")
                    .help_heading("GRIDDING"),

                // output options
                arg!(-d --date <LABEL> "Date label for the output directory and names")
                    .default_value("test")
                    .required(false)
                    .help_heading("OUTPUT"),
                arg!(--"out-dir" <PATH> "Root of the output [default: <basedir>/fits_files]")
                    .value_hint(DirPath)
                    .required(false)
                    .help_heading("OUTPUT"),
                arg!(--"write-db" "Also write the decibel cubes")
                    .help_heading("OUTPUT"),

                // resource options
                arg!(--parallel "Model antennas in parallel")
                    .help_heading("RESOURCES"),

                arg!(--"dry-run" "Just print the summary and exit"),
                arg!(--"no-draw-progress" "do not show progress bars"),
            ]);
        let matches = app.try_get_matches_from_mut(args)?;
        Ok(matches)
    }

    fn parse_io_matches(matches: &clap::ArgMatches) -> Result<IOContext, DriftError> {
        let task_id_path: PathBuf = match matches.value_of_t("task-ids") {
            Ok(path) => path,
            _ => unreachable!("--task-ids <PATH> is required, enforced by clap"),
        };
        let task_ids = read_task_ids(&task_id_path)?;
        if task_ids.is_empty() {
            return Err(DriftError::NoTaskIds);
        }
        let basedir: PathBuf = matches.value_of_t("basedir")?;
        let out_dir = match matches.value_of_t::<PathBuf>("out-dir") {
            Ok(out_dir) => out_dir,
            Err(err) if err.kind() != ArgumentNotFound => return Err(err.into()),
            Err(_) => basedir.join("fits_files"),
        };
        Ok(IOContext {
            task_ids,
            basedir,
            out_dir,
            date_label: matches.value_of_t("date")?,
            write_db: matches.is_present("write-db"),
        })
    }

    fn parse_calibrator_matches(
        matches: &clap::ArgMatches,
        first_task_id: &str,
    ) -> Result<CalibratorContext, DriftError> {
        let name: String = matches.value_of_t("calibname")?;
        let radec = match matches
            .values_of_t::<f64>("calibrator-radec")
            .map(|v| (v[0], v[1]))
        {
            Ok((ra, dec)) => {
                if !(-90.0..=90.0).contains(&dec) {
                    return Err(InvalidCommandLineArgument {
                        option: "--calibrator-radec <RA> <DEC>".into(),
                        expected: "-90 <= DEC <= 90".into(),
                        received: format!("{}", dec),
                    }
                    .into());
                }
                Some(RADec::from_degrees(ra, dec))
            }
            Err(err) if err.kind() != ArgumentNotFound => return Err(err.into()),
            Err(_) => None,
        };
        Ok(CalibratorContext::from_task_id(&name, radec, first_task_id)?)
    }

    fn parse_config_matches(matches: &clap::ArgMatches) -> Result<BeamModelConfig, DriftError> {
        let beams = parse_inclusive_range("--beams", matches.value_of("beams").unwrap_or("0,39"))?;
        if let Some(&last) = beams.last() {
            if last >= NUM_BEAMS {
                warn!(
                    "beam {} is beyond the {} compound beams of Apertif",
                    last, NUM_BEAMS
                );
            }
        }
        let antennas = if matches.is_present("no-antenna-suffix") {
            vec![None]
        } else {
            parse_inclusive_range("--antennas", matches.value_of("antennas").unwrap_or("0,11"))?
                .into_iter()
                .map(Some)
                .collect()
        };

        let num_bins: usize = matches.value_of_t("bin-num")?;
        if num_bins == 0 {
            return Err(InvalidCommandLineArgument {
                option: "--bin-num <BINS>".into(),
                expected: "at least one bin".into(),
                received: "0".into(),
            }
            .into());
        }
        let cell_size_arcsec: f64 = matches.value_of_t("cell-size")?;
        if !(cell_size_arcsec.is_finite() && cell_size_arcsec > 0.0) {
            return Err(InvalidCommandLineArgument {
                option: "--cell-size <ARCSEC>".into(),
                expected: "a positive number of arcseconds".into(),
                received: format!("{}", cell_size_arcsec),
            }
            .into());
        }

        Ok(BeamModelConfigBuilder::default()
            .beams(beams)
            .antennas(antennas)
            .num_bins(num_bins)
            .cell_size_arcsec(cell_size_arcsec)
            .scope(if matches.is_present("shared-normalisation") {
                NormalisationScope::Shared
            } else {
                NormalisationScope::PerPolarisation
            })
            .parallel(matches.is_present("parallel"))
            .draw_progress(!matches.is_present("no-draw-progress"))
            .build()?)
    }

    /// Parse an iterator of arguments, `args` into a `DriftContext`.
    ///
    /// # Errors
    ///
    /// Can raise:
    /// - `clap::Error` if clap cannot parse `args`
    /// - `IOError` if the task id list can't be read
    /// - `PosError` if the calibrator or the date of the first task is unknown
    /// - `DriftError::CLIError` if the arguments are invalid.
    /// - `DriftError::DryRun` if the user only wants the summary.
    pub fn from_args<I, T>(args: I) -> Result<Self, DriftError>
    where
        I: IntoIterator<Item = T> + Debug,
        T: Into<OsString> + Clone,
    {
        debug!("args:\n{:?}", &args);

        let matches = Self::get_matches(args)?;
        trace!("arg matches:\n{:?}", &matches);

        let io_ctx = Self::parse_io_matches(&matches)?;
        let calibrator = Self::parse_calibrator_matches(&matches, &io_ctx.task_ids[0])?;
        let config = Self::parse_config_matches(&matches)?;

        let result = Self {
            calibrator,
            config,
            io_ctx,
        };

        info!("{}", &result);

        if matches.is_present("dry-run") {
            return Err(DryRun {});
        }

        Ok(result)
    }

    /// Load the drift scans, model the beams and write the cubes.
    ///
    /// The binary never cancels a run. Callers that want to stop between
    /// antennas use [`DriftContext::run_with_cancel`].
    ///
    /// # Errors
    ///
    /// Fails with `DriftError::NoObservations` if none of the tasks could be
    /// loaded. Failures of single antennas or beams are in the report.
    pub fn run(self) -> Result<PipelineReport, DriftError> {
        self.run_with_cancel(&AtomicBool::new(false))
    }

    /// As [`DriftContext::run`], but no antenna is started once `cancel` is
    /// set.
    ///
    /// # Errors
    ///
    /// See [`DriftContext::run`].
    pub fn run_with_cancel(self, cancel: &AtomicBool) -> Result<PipelineReport, DriftError> {
        let Self {
            calibrator,
            config,
            io_ctx,
        } = self;

        let (observations, failures) =
            with_increment_duration!("read", io_ctx.load_observations());
        if observations.is_empty() {
            return Err(DriftError::NoObservations {
                num_tasks: failures.len(),
            });
        }

        let pipeline = BeamModelPipeline::new(&config, &calibrator, &observations)?;
        let writer = io_ctx.cube_writer(&calibrator.file_label());
        let report = pipeline.run(&writer, cancel);
        info!("Beam models:\n{}", report_table(&report));
        Ok(report)
    }
}

/// Run driftcube with the given arguments, returning the process exit code.
pub fn main_with_args<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
    I: Debug,
{
    let drift_ctx = match DriftContext::from_args(args) {
        Ok(drift_ctx) => drift_ctx,
        Err(DryRun {}) => {
            info!("Dry run. No files will be written.");
            return 0;
        }
        Err(ClapError(inner)) => {
            // Swallow broken pipe errors
            trace!("clap error: {:?}", inner.kind());
            let _ = inner.print();
            match inner.kind() {
                DisplayHelp | DisplayVersion => return 0,
                _ => return 1,
            }
        }
        Err(e) => {
            eprintln!("error parsing args: {e}");
            return 1;
        }
    };

    match drift_ctx.run() {
        Ok(report) => {
            info!(
                "total duration: {:?}",
                get_durations().into_iter().fold(
                    Duration::ZERO,
                    |duration_sum, (name, duration)| {
                        info!("{} duration: {:?}", name, duration);
                        duration_sum + duration
                    }
                )
            );
            if report.is_complete() {
                0
            } else {
                warn!("{} beam models could not be made", report.num_failed());
                2
            }
        }
        Err(e) => {
            eprintln!("driftcube failed: {e}");
            1
        }
    }
}

#[cfg(test)]
mod argparse_tests {
    use std::fs;

    use tempfile::{tempdir, TempDir};

    use super::*;
    use crate::error::CLIError;
    use approx::assert_abs_diff_eq;

    /// A task id list in a fresh directory.
    fn task_list(task_ids: &str) -> (TempDir, String) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tasks.txt");
        fs::write(&path, task_ids).unwrap();
        let path = path.to_str().unwrap().to_string();
        (dir, path)
    }

    #[test]
    fn test_parse_defaults() {
        let (_dir, tasks) = task_list("190303001\n190303002\n");
        let args = vec!["driftcube", "-f", &tasks];
        let drift_ctx = DriftContext::from_args(&args).unwrap();

        assert_eq!(drift_ctx.io_ctx.task_ids, vec!["190303001", "190303002"]);
        assert_eq!(drift_ctx.io_ctx.basedir, PathBuf::from("/tank/apertif/driftscans/"));
        assert_eq!(
            drift_ctx.io_ctx.out_dir,
            PathBuf::from("/tank/apertif/driftscans/fits_files")
        );
        assert_eq!(drift_ctx.io_ctx.date_label, "test");
        assert!(!drift_ctx.io_ctx.write_db);
        assert_eq!(drift_ctx.calibrator.name, "Cyg A");
        assert_eq!(drift_ctx.calibrator.file_label(), "CygA");
        assert_eq!(drift_ctx.config.beams, (0..40).collect::<Vec<_>>());
        assert_eq!(
            drift_ctx.config.antennas,
            (0..12).map(Some).collect::<Vec<_>>()
        );
        assert_eq!(drift_ctx.config.num_bins, 18);
        assert_abs_diff_eq!(drift_ctx.config.cell_size_arcsec, 100.0);
        assert_eq!(drift_ctx.config.scope, NormalisationScope::PerPolarisation);
        assert!(!drift_ctx.config.parallel);
    }

    #[test]
    fn test_parse_options() {
        let (_dir, tasks) = task_list("190722001\n");
        #[rustfmt::skip]
        let args = vec![
            "driftcube",
            "-f", &tasks,
            "-o", "/data/",
            "-c", "Cas A",
            "-b", "3,5",
            "--no-antenna-suffix",
            "-n", "4",
            "--cell-size", "50",
            "--shared-normalisation",
            "-d", "190722",
            "--out-dir", "/out",
            "--write-db",
            "--parallel",
            "--no-draw-progress",
        ];
        let drift_ctx = DriftContext::from_args(&args).unwrap();

        assert_eq!(drift_ctx.calibrator.name, "Cas A");
        assert_eq!(drift_ctx.config.beams, vec![3, 4, 5]);
        assert_eq!(drift_ctx.config.antennas, vec![None]);
        assert_eq!(drift_ctx.config.num_bins, 4);
        assert_abs_diff_eq!(drift_ctx.config.cell_size_deg(), 50.0 / 3600.0);
        assert_eq!(drift_ctx.config.scope, NormalisationScope::Shared);
        assert!(drift_ctx.config.parallel);
        assert!(!drift_ctx.config.draw_progress);
        assert_eq!(drift_ctx.io_ctx.out_dir, PathBuf::from("/out"));
        assert_eq!(drift_ctx.io_ctx.date_label, "190722");
        assert!(drift_ctx.io_ctx.write_db);

        let display = format!("{}", &drift_ctx);
        assert!(display.contains("Cas A"));
        assert!(display.contains("2019-07-22"));
        assert!(display.contains("Will model antennas in parallel"));
        assert!(display.contains("Will write decibel cubes"));
    }

    #[test]
    fn test_parse_calibrator_radec() {
        let (_dir, tasks) = task_list("190303001\n");
        #[rustfmt::skip]
        let args = vec![
            "driftcube", "-f", &tasks,
            "-c", "My Source",
            "--calibrator-radec", "10.0", "20.0",
        ];
        let drift_ctx = DriftContext::from_args(&args).unwrap();
        assert_abs_diff_eq!(drift_ctx.calibrator.radec_j2000.ra, 10.0_f64.to_radians());
        assert_abs_diff_eq!(drift_ctx.calibrator.radec_j2000.dec, 20.0_f64.to_radians());

        #[rustfmt::skip]
        let args = vec![
            "driftcube", "-f", &tasks,
            "--calibrator-radec", "10.0", "91.0",
        ];
        assert!(matches!(
            DriftContext::from_args(&args),
            Err(DriftError::CLIError(CLIError::InvalidCommandLineArgument { .. }))
        ));
    }

    #[test]
    fn test_parse_unknown_calibrator() {
        let (_dir, tasks) = task_list("190303001\n");
        let args = vec!["driftcube", "-f", &tasks, "-c", "Not A Source"];
        assert!(matches!(
            DriftContext::from_args(&args),
            Err(DriftError::PosError(_))
        ));
    }

    #[test]
    fn test_parse_bad_task_id() {
        let (_dir, tasks) = task_list("scan_a\n");
        let args = vec!["driftcube", "-f", &tasks];
        assert!(matches!(
            DriftContext::from_args(&args),
            Err(DriftError::PosError(_))
        ));

        let (_dir, tasks) = task_list("\n\n");
        let args = vec!["driftcube", "-f", &tasks];
        assert!(matches!(
            DriftContext::from_args(&args),
            Err(DriftError::NoTaskIds)
        ));
    }

    #[test]
    fn test_parse_missing_task_ids() {
        let args = vec!["driftcube", "-c", "Cyg A"];
        match DriftContext::from_args(&args) {
            Err(DriftError::ClapError(inner)) => assert!(matches!(
                inner.kind(),
                clap::error::ErrorKind::MissingRequiredArgument { .. }
            )),
            Err(e) => panic!("expected missing required argument error, not {}", e),
            Ok(_) => panic!("expected error, but got Ok(_)"),
        }

        let args = vec!["driftcube", "-f", "/nonexistent/tasks.txt"];
        assert!(matches!(
            DriftContext::from_args(&args),
            Err(DriftError::IOError(_))
        ));
    }

    #[test]
    fn test_parse_invalid_ranges() {
        let (_dir, tasks) = task_list("190303001\n");
        for (option, value) in [
            ("-b", "5,3"),
            ("-b", "a,b"),
            ("-a", "0,1,2"),
            ("-n", "0"),
            ("--cell-size", "0"),
        ] {
            let args = vec!["driftcube", "-f", &tasks, option, value];
            assert!(
                matches!(
                    DriftContext::from_args(&args),
                    Err(DriftError::CLIError(CLIError::InvalidCommandLineArgument { .. }))
                ),
                "{option} {value}"
            );
        }
    }

    #[test]
    fn test_parse_single_beam() {
        let (_dir, tasks) = task_list("190303001\n");
        let args = vec!["driftcube", "-f", &tasks, "-b", "7", "-a", "2,3"];
        let drift_ctx = DriftContext::from_args(&args).unwrap();
        assert_eq!(drift_ctx.config.beams, vec![7]);
        assert_eq!(drift_ctx.config.antennas, vec![Some(2), Some(3)]);
    }

    #[test]
    fn test_dry_run() {
        let (_dir, tasks) = task_list("190303001\n");
        let args = vec!["driftcube", "-f", &tasks, "--dry-run"];
        assert!(matches!(
            DriftContext::from_args(&args),
            Err(DriftError::DryRun {})
        ));
        assert_eq!(main_with_args(&args), 0);
    }

    #[test]
    fn test_report_table() {
        use crate::{
            gridding::GridError,
            pipeline::{AntennaOutcome, BeamError},
        };

        let report = PipelineReport {
            outcomes: vec![
                AntennaOutcome {
                    antenna: Some(3),
                    written: vec![0, 1],
                    failed: vec![(2, BeamError::Grid(GridError::Degenerate))],
                    error: None,
                },
                AntennaOutcome {
                    antenna: None,
                    written: vec![],
                    failed: vec![],
                    error: None,
                },
            ],
            cancelled: false,
        };
        let table = report_table(&report);
        assert_eq!(table.len(), 2);
        let rendered = table.to_string();
        assert!(rendered.contains("02"));
        assert!(rendered.lines().any(|line| line.trim_start().starts_with('-')));
    }

    #[test]
    fn test_help_and_version_exit_cleanly() {
        assert_eq!(main_with_args(["driftcube", "--help"]), 0);
        assert_eq!(main_with_args(["driftcube", "--version"]), 0);
        assert_eq!(main_with_args(["driftcube", "--no-such-option"]), 1);
    }
}
