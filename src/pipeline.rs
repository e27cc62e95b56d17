//! Driving the reduction of drift scans into beam models.
//!
//! For every antenna, for every beam, every frequency bin of both
//! polarisations is pooled across observations, gridded and normalised into
//! a [`BeamCube`], which is handed to a [`CubeSink`].
//!
//! The sample positions of a beam don't depend on the antenna, bin or
//! polarisation, so each beam's [`BeamGeometry`] is computed once and shared
//! by every antenna.

use std::{
    fmt::Display,
    sync::atomic::{AtomicBool, Ordering},
};

use derive_builder::Builder;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::{debug, error, info, trace, warn};
use thiserror::Error;

use crate::{
    constants::{
        ARCSEC_PER_DEGREE, DEFAULT_CELL_SIZE_ARCSEC, DEFAULT_NUM_FREQ_BINS, NUM_ANTENNAS, NUM_BEAMS,
    },
    cube::{
        BeamCube, CubeAssembler, CubeError, CubeWcs, NormalisationScope, Polarisation,
        ReferencePixel, SpectralSetup,
    },
    error::DriftError,
    gridding::{GridAxes, GridError, ScatterGridder},
    io::{error::IOError, CubeKey, CubeSink},
    marlu::rayon::prelude::*,
    ndarray::Array2,
    observation::{column_name, Observation, ObservationError},
    offsets::sky_offsets,
    pos::CalibratorContext,
    with_increment_duration,
};

/// Why the geometry of a beam couldn't be computed.
#[derive(Error, Clone, Debug, PartialEq)]
pub enum GeometryError {
    #[error(transparent)]
    Observation(#[from] ObservationError),

    #[error(transparent)]
    Grid(#[from] GridError),

    #[error("beam {beam} has no samples with a finite position")]
    NoSamples { beam: usize },
}

/// Why a beam model wasn't written.
#[derive(Error, Debug)]
pub enum BeamError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Observation(#[from] ObservationError),

    #[error(transparent)]
    Grid(#[from] GridError),

    #[error(transparent)]
    Cube(#[from] CubeError),

    #[error(transparent)]
    IO(#[from] IOError),
}

impl BeamError {
    /// Missing data ends an antenna: its remaining beams are not attempted.
    /// Anything else only loses the one beam.
    pub fn is_antenna_fatal(&self) -> bool {
        matches!(
            self,
            BeamError::Observation(_) | BeamError::Geometry(GeometryError::Observation(_))
        )
    }
}

/// Options for modelling beams
#[derive(Builder, Debug, Clone)]
pub struct BeamModelConfig {
    /// Compound beams to model
    #[builder(default = "(0..NUM_BEAMS).collect()")]
    pub beams: Vec<usize>,
    /// Antennas to model, `None` for data without an antenna suffix
    #[builder(default = "(0..NUM_ANTENNAS).map(Some).collect()")]
    pub antennas: Vec<Option<usize>>,
    /// Number of frequency bins in each cube
    #[builder(default = "DEFAULT_NUM_FREQ_BINS")]
    pub num_bins: usize,
    /// Grid cell size \[arcseconds\]
    #[builder(default = "DEFAULT_CELL_SIZE_ARCSEC")]
    pub cell_size_arcsec: f64,
    /// How xx and yy are normalised
    #[builder(default)]
    pub scope: NormalisationScope,
    /// Frequency layout of the bins
    #[builder(default)]
    pub spectral: SpectralSetup,
    /// Whether to model antennas in parallel
    #[builder(default = "false")]
    pub parallel: bool,
    /// Whether to draw progress bars
    #[builder(default = "true")]
    pub draw_progress: bool,
}

impl BeamModelConfig {
    pub fn cell_size_deg(&self) -> f64 {
        self.cell_size_arcsec / ARCSEC_PER_DEGREE
    }
}

impl Display for BeamModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Beams:                {:?}", self.beams)?;
        let antennas: Vec<String> = self
            .antennas
            .iter()
            .map(|antenna| match antenna {
                Some(antenna) => antenna.to_string(),
                None => "-".to_string(),
            })
            .collect();
        writeln!(f, "Antennas:             [{}]", antennas.join(", "))?;
        writeln!(
            f,
            "Frequency bins:       {} of {} channels from {:.3} MHz",
            self.num_bins,
            self.spectral.channels_per_bin,
            self.spectral.start_freq_hz() / 1e6
        )?;
        writeln!(f, "Cell size:            {}\"", self.cell_size_arcsec)?;
        writeln!(f, "Normalisation:        {}", self.scope)?;
        writeln!(
            f,
            "{} model antennas in parallel.",
            if self.parallel { "Will" } else { "Will not" }
        )?;
        Ok(())
    }
}

/// Where the samples of a beam land on the sky, and the grid they are
/// resampled onto.
#[derive(Debug)]
pub struct BeamGeometry {
    pub beam: usize,
    /// (observation, timestep) of each gridded sample
    samples: Vec<(usize, usize)>,
    gridder: ScatterGridder,
    pub reference: ReferencePixel,
    pub wcs: CubeWcs,
}

impl BeamGeometry {
    /// Project the timestamps of every observation into offsets from the
    /// calibrator, pool them, and triangulate.
    ///
    /// Timestamps which aren't finite are left out.
    ///
    /// # Errors
    ///
    /// Fails if an observation has no position for `beam`, or if the pooled
    /// samples can't be triangulated.
    pub fn new(
        beam: usize,
        observations: &[Observation],
        calibrator: &CalibratorContext,
        cell_size_deg: f64,
        spectral: &SpectralSetup,
    ) -> Result<Self, GeometryError> {
        let mut samples = vec![];
        let mut xs = vec![];
        let mut ys = vec![];
        for (obs_idx, observation) in observations.iter().enumerate() {
            let beam_hadec = observation.beam_hadec(beam)?;
            let (time_idxs, times): (Vec<usize>, Vec<f64>) = observation
                .times_mjd_s
                .iter()
                .enumerate()
                .filter(|(_, time)| time.is_finite())
                .map(|(time_idx, &time)| (time_idx, time))
                .unzip();
            for (time_idx, offset) in time_idxs
                .into_iter()
                .zip(sky_offsets(calibrator, &times, beam_hadec))
            {
                if offset.dha_phys_deg.is_finite() && offset.dec_deg.is_finite() {
                    samples.push((obs_idx, time_idx));
                    xs.push(offset.dha_phys_deg);
                    ys.push(offset.dec_deg);
                }
            }
        }
        let num_times: usize = observations.iter().map(Observation::num_times).sum();
        if samples.len() < num_times {
            debug!(
                "beam {}: left out {} of {} samples without a finite position",
                beam,
                num_times - samples.len(),
                num_times
            );
        }

        let axes = GridAxes::from_samples(&xs, &ys, cell_size_deg)
            .ok_or(GeometryError::NoSamples { beam })?;
        let reference = ReferencePixel::new(&axes, calibrator.radec_apparent.dec.to_degrees());
        trace!(
            "beam {}: {} x {} grid from ({:.4}, {:.4}), reference pixel ({:.2}, {:.2})",
            beam,
            axes.num_x,
            axes.num_y,
            axes.x_min,
            axes.y_min,
            reference.x,
            reference.y
        );
        let gridder = ScatterGridder::new(&xs, &ys, axes)?;
        let wcs = CubeWcs::new(reference, calibrator, cell_size_deg, spectral);
        Ok(Self {
            beam,
            samples,
            gridder,
            reference,
            wcs,
        })
    }

    pub fn axes(&self) -> &GridAxes {
        self.gridder.axes()
    }

    pub fn num_samples(&self) -> usize {
        self.samples.len()
    }

    /// A column of every observation, each with its own median removed, in
    /// the order of the gridded samples.
    ///
    /// # Errors
    ///
    /// Fails if any observation lacks the column.
    pub fn pooled_values(
        &self,
        observations: &[Observation],
        column: &str,
    ) -> Result<Vec<f64>, ObservationError> {
        let per_observation = observations
            .iter()
            .map(|observation| observation.median_subtracted(column))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self
            .samples
            .iter()
            .map(|&(obs_idx, time_idx)| per_observation[obs_idx][time_idx])
            .collect())
    }

    /// Grid the xx and yy data of one frequency bin.
    ///
    /// # Errors
    ///
    /// Fails if a column is missing.
    pub fn grid_bin(
        &self,
        observations: &[Observation],
        bin: usize,
        antenna: Option<usize>,
    ) -> Result<[Array2<f64>; 2], BeamError> {
        let grid_pol = |pol: Polarisation| -> Result<Array2<f64>, BeamError> {
            let values =
                self.pooled_values(observations, &column_name(self.beam, bin, pol, antenna))?;
            Ok(self.gridder.grid(&values)?)
        };
        Ok([grid_pol(Polarisation::XX)?, grid_pol(Polarisation::YY)?])
    }
}

/// What happened to each beam of an antenna.
#[derive(Debug)]
pub struct AntennaOutcome {
    pub antenna: Option<usize>,
    /// Beams whose cubes were written
    pub written: Vec<usize>,
    /// Beams which failed on their own
    pub failed: Vec<(usize, BeamError)>,
    /// The error which ended this antenna early, if any
    pub error: Option<BeamError>,
}

impl AntennaOutcome {
    fn new(antenna: Option<usize>) -> Self {
        Self {
            antenna,
            written: vec![],
            failed: vec![],
            error: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.error.is_none()
    }
}

/// The outcome of every antenna which was attempted.
#[derive(Debug, Default)]
pub struct PipelineReport {
    pub outcomes: Vec<AntennaOutcome>,
    /// Whether some antennas were never started
    pub cancelled: bool,
}

impl PipelineReport {
    /// Number of beam models written.
    pub fn num_written(&self) -> usize {
        self.outcomes.iter().map(|o| o.written.len()).sum()
    }

    /// Number of beam failures, and antennas ended early.
    pub fn num_failed(&self) -> usize {
        self.outcomes
            .iter()
            .map(|o| o.failed.len() + usize::from(o.error.is_some()))
            .sum()
    }

    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.outcomes.iter().all(AntennaOutcome::is_complete)
    }
}

/// Models the beams of a set of observations of one calibrator.
pub struct BeamModelPipeline<'a> {
    config: &'a BeamModelConfig,
    calibrator: &'a CalibratorContext,
    observations: &'a [Observation],
}

impl<'a> BeamModelPipeline<'a> {
    /// # Errors
    ///
    /// Fails with [`DriftError::NoObservations`] if `observations` is empty.
    pub fn new(
        config: &'a BeamModelConfig,
        calibrator: &'a CalibratorContext,
        observations: &'a [Observation],
    ) -> Result<Self, DriftError> {
        if observations.is_empty() {
            return Err(DriftError::NoObservations { num_tasks: 0 });
        }
        Ok(Self {
            config,
            calibrator,
            observations,
        })
    }

    /// The geometry of every configured beam, in order.
    pub fn beam_geometries(&self) -> Vec<(usize, Result<BeamGeometry, GeometryError>)> {
        let geometry = |&beam: &usize| {
            let result = BeamGeometry::new(
                beam,
                self.observations,
                self.calibrator,
                self.config.cell_size_deg(),
                &self.config.spectral,
            );
            if let Err(err) = &result {
                warn!("beam {}: no geometry: {}", beam, err);
            }
            (beam, result)
        };
        if self.config.parallel {
            self.config.beams.par_iter().map(geometry).collect()
        } else {
            self.config.beams.iter().map(geometry).collect()
        }
    }

    /// Model a single beam of an antenna, and hand the cube to `sink`.
    ///
    /// # Errors
    ///
    /// Fails if a column is missing, the bins don't assemble, or the sink
    /// fails.
    pub fn model_beam(
        &self,
        antenna: Option<usize>,
        geometry: &BeamGeometry,
        sink: &dyn CubeSink,
    ) -> Result<BeamCube, BeamError> {
        let mut assembler =
            CubeAssembler::new(self.config.num_bins, geometry.reference, self.config.scope);
        for bin in 0..self.config.num_bins {
            let [xx, yy] = with_increment_duration!(
                "grid",
                geometry.grid_bin(self.observations, bin, antenna)?
            );
            assembler.insert(bin, xx.view(), yy.view())?;
        }
        let cube = assembler.finalise(geometry.wcs.clone())?;
        let key = CubeKey {
            antenna,
            beam: geometry.beam,
        };
        with_increment_duration!("write", sink.write_cube(key, &cube)?);
        Ok(cube)
    }

    fn model_antenna(
        &self,
        antenna: Option<usize>,
        geometries: &[(usize, Result<BeamGeometry, GeometryError>)],
        sink: &dyn CubeSink,
        progress: &ProgressBar,
    ) -> AntennaOutcome {
        let mut outcome = AntennaOutcome::new(antenna);
        for (beam_idx, (beam, geometry)) in geometries.iter().enumerate() {
            let result = match geometry {
                Ok(geometry) => self.model_beam(antenna, geometry, sink).map(drop),
                Err(err) => Err(BeamError::from(err.clone())),
            };
            progress.inc(1);
            match result {
                Ok(()) => outcome.written.push(*beam),
                Err(err) if err.is_antenna_fatal() => {
                    error!("antenna {:?}: giving up at beam {}: {}", antenna, beam, err);
                    progress.inc((geometries.len() - beam_idx - 1) as u64);
                    outcome.error = Some(err);
                    break;
                }
                Err(err) => {
                    warn!("antenna {:?}: skipping beam {}: {}", antenna, beam, err);
                    outcome.failed.push((*beam, err));
                }
            }
        }
        debug!(
            "antenna {:?}: wrote {} beams",
            antenna,
            outcome.written.len()
        );
        outcome
    }

    /// Model every configured beam of every configured antenna.
    ///
    /// `cancel` is checked before starting each antenna; antennas which
    /// haven't started when it's set are left out of the report.
    pub fn run(&self, sink: &dyn CubeSink, cancel: &AtomicBool) -> PipelineReport {
        let geometries = with_increment_duration!("geometry", self.beam_geometries());

        let draw_target = if self.config.draw_progress {
            ProgressDrawTarget::stderr()
        } else {
            ProgressDrawTarget::hidden()
        };
        let progress = ProgressBar::with_draw_target(
            Some((self.config.antennas.len() * geometries.len()) as u64),
            draw_target,
        );
        if let Ok(style) = ProgressStyle::default_bar().template(
            "{msg:16}: [{elapsed_precise}] [{wide_bar:.cyan/blue}] {percent:3}% ({eta:5})",
        ) {
            progress.set_style(style.progress_chars("=> "));
        }
        progress.set_message("beam models");

        let model = |&antenna: &Option<usize>| {
            if cancel.load(Ordering::Relaxed) {
                None
            } else {
                Some(self.model_antenna(antenna, &geometries, sink, &progress))
            }
        };
        let outcomes: Vec<AntennaOutcome> = if self.config.parallel {
            self.config.antennas.par_iter().filter_map(model).collect()
        } else {
            self.config.antennas.iter().filter_map(model).collect()
        };
        progress.finish();

        let report = PipelineReport {
            cancelled: outcomes.len() < self.config.antennas.len(),
            outcomes,
        };
        if report.cancelled {
            warn!(
                "cancelled after {} of {} antennas",
                report.outcomes.len(),
                self.config.antennas.len()
            );
        }
        info!(
            "wrote {} beam models, {} failures",
            report.num_written(),
            report.num_failed()
        );
        report
    }
}
