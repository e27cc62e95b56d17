//! Assembly of gridded frequency bins into normalised beam-model cubes.

use std::fmt::Display;

use itertools::izip;
use log::trace;
use thiserror::Error;

use crate::{
    constants::{
        APERTIF_CENTRE_FREQ_HZ, APERTIF_CHANNELS_PER_BIN, APERTIF_CHANNEL_WIDTH_HZ,
        APERTIF_FIRST_CHANNEL, APERTIF_TOTAL_CHANNELS, HI_REST_FREQ_HZ,
    },
    gridding::GridAxes,
    ndarray::{s, Array3, ArrayView2, Zip},
    pos::CalibratorContext,
};

/// Half-width of the square window searched for the normalisation peak.
pub const PEAK_WINDOW_HALF_WIDTH: usize = 3;

#[derive(Error, Clone, Debug, PartialEq)]
pub enum CubeError {
    #[error("bin {bin} has shape {found:?}, but the cube was started with {expected:?}")]
    ShapeMismatch {
        bin: usize,
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("bin {bin} is out of range for a cube of {num_bins} bins")]
    BinOutOfRange { bin: usize, num_bins: usize },

    #[error("no bins were inserted into the cube")]
    Empty,
}

/// A linear feed polarisation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Polarisation {
    XX,
    YY,
}

impl Polarisation {
    pub const ALL: [Polarisation; 2] = [Polarisation::XX, Polarisation::YY];

    /// The name used in table columns and output files.
    pub fn label(&self) -> &'static str {
        match self {
            Polarisation::XX => "xx",
            Polarisation::YY => "yy",
        }
    }
}

impl Display for Polarisation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// How the peak used to normalise each frequency plane is chosen.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum NormalisationScope {
    /// Each polarisation is divided by its own peak.
    #[default]
    PerPolarisation,
    /// Both polarisations are divided by the larger of the two peaks, which
    /// keeps their relative gain in the squint plane.
    Shared,
}

impl Display for NormalisationScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NormalisationScope::PerPolarisation => write!(f, "per polarisation"),
            NormalisationScope::Shared => write!(f, "shared"),
        }
    }
}

/// Spectral layout of the correlator, and how channels are binned.
#[derive(Clone, Debug, PartialEq)]
pub struct SpectralSetup {
    pub centre_freq_hz: f64,
    pub channel_width_hz: f64,
    pub total_channels: usize,
    pub first_channel: usize,
    pub channels_per_bin: usize,
    pub rest_freq_hz: f64,
}

impl Default for SpectralSetup {
    fn default() -> Self {
        Self {
            centre_freq_hz: APERTIF_CENTRE_FREQ_HZ,
            channel_width_hz: APERTIF_CHANNEL_WIDTH_HZ,
            total_channels: APERTIF_TOTAL_CHANNELS,
            first_channel: APERTIF_FIRST_CHANNEL,
            channels_per_bin: APERTIF_CHANNELS_PER_BIN,
            rest_freq_hz: HI_REST_FREQ_HZ,
        }
    }
}

impl SpectralSetup {
    /// Frequency of the first binned channel.
    pub fn start_freq_hz(&self) -> f64 {
        self.centre_freq_hz
            + self.channel_width_hz
                * (self.first_channel as f64 - self.total_channels as f64 / 2.0)
    }

    pub fn bin_width_hz(&self) -> f64 {
        self.channel_width_hz * self.channels_per_bin as f64
    }
}

/// The calibrator's position on the grid, as a 1-based fractional pixel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReferencePixel {
    pub x: f64,
    pub y: f64,
}

impl ReferencePixel {
    /// The calibrator sits at zero hour angle offset, and at its apparent
    /// declination.
    pub fn new(axes: &GridAxes, cal_dec_deg: f64) -> Self {
        Self {
            x: (0.0 - axes.x_min) / axes.cell_size + 1.0,
            y: (cal_dec_deg - axes.y_min) / axes.cell_size + 1.0,
        }
    }

    /// The 0-based (row, column) of the pixel nearest the reference. It may
    /// lie off the grid; `None` if the reference isn't finite.
    pub fn window_centre(&self) -> Option<(isize, isize)> {
        let to_index = |one_based: f64| {
            let idx = (one_based - 1.0).round();
            idx.is_finite().then_some(idx as isize)
        };
        Some((to_index(self.y)?, to_index(self.x)?))
    }

    /// The pixel nearest the reference, if it lies on a grid of shape `dim`.
    pub fn nearest_index(&self, dim: (usize, usize)) -> Option<(usize, usize)> {
        let (row, col) = self.window_centre()?;
        let row = usize::try_from(row).ok().filter(|&row| row < dim.0)?;
        let col = usize::try_from(col).ok().filter(|&col| col < dim.1)?;
        Some((row, col))
    }
}

/// The largest non-NaN value in the square window of half-width `half_width`
/// around `centre` (row, column), clipped to the grid. The centre may be off
/// the grid. NaN if the window holds no numbers.
pub fn window_max(grid: ArrayView2<f64>, centre: (isize, isize), half_width: usize) -> f64 {
    let (rows, cols) = grid.dim();
    let half_width = half_width as isize;
    let clip = |centre: isize, len: usize| {
        let start = (centre - half_width).max(0);
        let end = (centre + half_width + 1).min(len as isize);
        (start < end).then(|| start as usize..end as usize)
    };
    let (row_range, col_range) = match (clip(centre.0, rows), clip(centre.1, cols)) {
        (Some(row_range), Some(col_range)) => (row_range, col_range),
        _ => return f64::NAN,
    };
    grid.slice(s![row_range, col_range])
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(f64::NAN, f64::max)
}

/// World coordinates of a beam cube: a TAN projection centred on the
/// calibrator, and a frequency axis.
#[derive(Clone, Debug, PartialEq)]
pub struct CubeWcs {
    pub ctype: [&'static str; 3],
    pub cunit: [&'static str; 3],
    pub crpix: [f64; 3],
    pub crval: [f64; 3],
    pub cdelt: [f64; 3],
    pub specsys: &'static str,
    pub restfrq: f64,
}

impl CubeWcs {
    pub fn new(
        reference: ReferencePixel,
        calibrator: &CalibratorContext,
        cell_size_deg: f64,
        spectral: &SpectralSetup,
    ) -> Self {
        Self {
            ctype: ["RA---TAN", "DEC--TAN", "FREQ"],
            cunit: ["deg", "deg", "Hz"],
            crpix: [reference.x, reference.y, 1.0],
            crval: [
                calibrator.radec_apparent.ra.to_degrees(),
                calibrator.radec_apparent.dec.to_degrees(),
                spectral.start_freq_hz(),
            ],
            cdelt: [-cell_size_deg, cell_size_deg, spectral.bin_width_hz()],
            specsys: "TOPOCENT",
            restfrq: spectral.rest_freq_hz,
        }
    }
}

/// A finished beam model. All cubes have shape (bins, rows, columns), with
/// rows along declination and columns along hour angle.
#[derive(Clone, Debug)]
pub struct BeamCube {
    pub xx: Array3<f64>,
    pub yy: Array3<f64>,
    pub db_xx: Array3<f64>,
    pub db_yy: Array3<f64>,
    /// sqrt(0.5 yy² + 0.5 xx²)
    pub stokes_i: Array3<f64>,
    /// xx - yy
    pub squint: Array3<f64>,
    /// the divisor applied to each (bin, polarisation) plane
    pub divisors: Vec<[f64; 2]>,
    pub wcs: CubeWcs,
}

impl BeamCube {
    /// Cube planes by the suffix they are written with.
    pub fn products(&self, with_db: bool) -> Vec<(&'static str, &Array3<f64>)> {
        let mut products = vec![
            ("xx", &self.xx),
            ("yy", &self.yy),
            ("I", &self.stokes_i),
            ("diff", &self.squint),
        ];
        if with_db {
            products.push(("db_xx", &self.db_xx));
            products.push(("db_yy", &self.db_yy));
        }
        products
    }

    pub fn num_bins(&self) -> usize {
        self.xx.dim().0
    }
}

/// Builds a [`BeamCube`] one frequency bin at a time.
///
/// The grid shape is fixed by the first bin inserted.
#[derive(Debug)]
pub struct CubeAssembler {
    num_bins: usize,
    reference: ReferencePixel,
    scope: NormalisationScope,
    cubes: Option<[Array3<f64>; 2]>,
    divisors: Vec<[f64; 2]>,
    inserted: usize,
}

impl CubeAssembler {
    pub fn new(num_bins: usize, reference: ReferencePixel, scope: NormalisationScope) -> Self {
        Self {
            num_bins,
            reference,
            scope,
            cubes: None,
            divisors: vec![[f64::NAN; 2]; num_bins],
            inserted: 0,
        }
    }

    /// Normalise the xx and yy grids of `bin` by their peaks near the
    /// reference pixel, and store them.
    ///
    /// # Errors
    ///
    /// Fails if the grids don't match each other or earlier bins in shape,
    /// or if `bin` is out of range.
    pub fn insert<'a>(
        &mut self,
        bin: usize,
        xx: ArrayView2<'a, f64>,
        yy: ArrayView2<'a, f64>,
    ) -> Result<(), CubeError> {
        if bin >= self.num_bins {
            return Err(CubeError::BinOutOfRange {
                bin,
                num_bins: self.num_bins,
            });
        }
        let shape = xx.dim();
        if yy.dim() != shape {
            return Err(CubeError::ShapeMismatch {
                bin,
                expected: shape,
                found: yy.dim(),
            });
        }
        let num_bins = self.num_bins;
        let cubes = self.cubes.get_or_insert_with(|| {
            [
                Array3::from_elem((num_bins, shape.0, shape.1), f64::NAN),
                Array3::from_elem((num_bins, shape.0, shape.1), f64::NAN),
            ]
        });
        let (_, rows, cols) = cubes[0].dim();
        if (rows, cols) != shape {
            return Err(CubeError::ShapeMismatch {
                bin,
                expected: (rows, cols),
                found: shape,
            });
        }

        let peaks = match self.reference.window_centre() {
            Some(centre) => [
                window_max(xx, centre, PEAK_WINDOW_HALF_WIDTH),
                window_max(yy, centre, PEAK_WINDOW_HALF_WIDTH),
            ],
            None => [f64::NAN; 2],
        };
        let divisors = match self.scope {
            NormalisationScope::PerPolarisation => peaks,
            NormalisationScope::Shared => [peaks[0].max(peaks[1]); 2],
        };
        trace!(
            "bin {}: peak window at {:?}, divisors xx={} yy={}",
            bin,
            self.reference,
            divisors[0],
            divisors[1]
        );

        for (cube, grid, &divisor) in izip!(cubes.iter_mut(), [xx, yy], divisors.iter()) {
            Zip::from(cube.slice_mut(s![bin, .., ..]))
                .and(grid)
                .for_each(|out, &value| *out = value / divisor);
        }
        self.divisors[bin] = divisors;
        self.inserted += 1;
        Ok(())
    }

    /// Derive the decibel, Stokes I and squint planes.
    ///
    /// # Errors
    ///
    /// Fails with [`CubeError::Empty`] if nothing was inserted.
    pub fn finalise(self, wcs: CubeWcs) -> Result<BeamCube, CubeError> {
        let [xx, yy] = match self.cubes {
            Some(cubes) if self.inserted > 0 => cubes,
            _ => return Err(CubeError::Empty),
        };
        let db_xx = xx.mapv(|v| 10.0 * v.log10());
        let db_yy = yy.mapv(|v| 10.0 * v.log10());
        let stokes_i = Zip::from(&xx)
            .and(&yy)
            .map_collect(|&x, &y| (0.5 * y * y + 0.5 * x * x).sqrt());
        let squint = &xx - &yy;
        Ok(BeamCube {
            xx,
            yy,
            db_xx,
            db_yy,
            stokes_i,
            squint,
            divisors: self.divisors,
            wcs,
        })
    }
}
