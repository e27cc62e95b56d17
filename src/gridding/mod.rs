//! Interpolation of scattered samples onto a regular grid.
//!
//! Drift scan samples fall along tracks in the offset plane, one track per
//! observation. [`ScatterGridder`] triangulates the sample positions once, and
//! can then resample any number of value sets (one per frequency bin and
//! polarisation) onto the same [`GridAxes`]. Inside the convex hull of the
//! samples the surface is piecewise cubic and continuous; outside it, NaN.

mod cubic;
mod delaunay;
pub mod error;

use std::collections::HashMap;

use log::trace;

use self::{
    cubic::{estimate_gradients, eval_patch},
    delaunay::{Location, Point, Triangulation},
};
pub use error::GridError;
use crate::ndarray::Array2;

/// Number of elements in `start, start + step, ...` strictly below `stop`.
///
/// ```rust
/// use driftcube::gridding::arange_len;
///
/// assert_eq!(arange_len(-1.0, 1.0, 0.5), 4);
/// assert_eq!(arange_len(0.0, 1.1, 0.5), 3);
/// assert_eq!(arange_len(1.0, 1.0, 0.5), 0);
/// ```
pub fn arange_len(start: f64, stop: f64, step: f64) -> usize {
    let len = ((stop - start) / step).ceil();
    if len.is_finite() && len > 0.0 {
        len as usize
    } else {
        0
    }
}

/// A regular grid. Column `ix` is at `x_min + ix * cell_size`, row `iy` at
/// `y_min + iy * cell_size`; the maxima are excluded.
#[derive(Clone, Debug, PartialEq)]
pub struct GridAxes {
    pub x_min: f64,
    pub y_min: f64,
    pub cell_size: f64,
    pub num_x: usize,
    pub num_y: usize,
}

impl GridAxes {
    pub fn from_extent(x_min: f64, x_max: f64, y_min: f64, y_max: f64, cell_size: f64) -> Self {
        Self {
            x_min,
            y_min,
            cell_size,
            num_x: arange_len(x_min, x_max, cell_size),
            num_y: arange_len(y_min, y_max, cell_size),
        }
    }

    /// Axes spanning the finite samples in `xs` and `ys`, or `None` if there
    /// are none.
    pub fn from_samples(xs: &[f64], ys: &[f64], cell_size: f64) -> Option<Self> {
        let extent = |values: &[f64]| {
            values
                .iter()
                .copied()
                .filter(|v| v.is_finite())
                .fold(None, |acc: Option<(f64, f64)>, v| match acc {
                    None => Some((v, v)),
                    Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
                })
        };
        let (x_min, x_max) = extent(xs)?;
        let (y_min, y_max) = extent(ys)?;
        Some(Self::from_extent(x_min, x_max, y_min, y_max, cell_size))
    }

    #[inline]
    pub fn x(&self, ix: usize) -> f64 {
        self.x_min + ix as f64 * self.cell_size
    }

    #[inline]
    pub fn y(&self, iy: usize) -> f64 {
        self.y_min + iy as f64 * self.cell_size
    }

    /// Grid shape as (rows, columns), i.e. (y, x).
    pub fn dim(&self) -> (usize, usize) {
        (self.num_y, self.num_x)
    }
}

/// Maps raw coordinates into the unit square, preserving aspect ratio.
#[derive(Clone, Copy, Debug)]
struct Normaliser {
    origin: Point,
    scale: f64,
}

impl Normaliser {
    fn apply(&self, x: f64, y: f64) -> Point {
        [
            (x - self.origin[0]) / self.scale,
            (y - self.origin[1]) / self.scale,
        ]
    }
}

/// Resamples scattered values onto a fixed grid.
///
/// Construction does the expensive geometric work: merging coincident
/// samples, triangulating, and locating every grid point. [`grid`] then only
/// has to estimate gradients and evaluate patches.
///
/// [`grid`]: ScatterGridder::grid
#[derive(Debug)]
pub struct ScatterGridder {
    axes: GridAxes,
    /// distinct sample positions, normalised into the unit square
    points: Vec<Point>,
    vertex_neighbours: Vec<Vec<usize>>,
    /// distinct vertex of each input sample
    sample_vertex: Vec<usize>,
    samples_per_vertex: Vec<usize>,
    /// containing triangle and barycentric coordinates of each grid point,
    /// in row-major order; `None` outside the convex hull
    locations: Vec<Option<Location>>,
}

impl ScatterGridder {
    /// Triangulate the sample positions `(xs[i], ys[i])` and locate the
    /// points of `axes` within the triangulation.
    ///
    /// # Errors
    ///
    /// Fails when the positions are mismatched, non-finite, or fewer than
    /// three distinct non-collinear points.
    pub fn new(xs: &[f64], ys: &[f64], axes: GridAxes) -> Result<Self, GridError> {
        if xs.len() != ys.len() {
            return Err(GridError::MismatchedLengths {
                xs: xs.len(),
                ys: ys.len(),
            });
        }
        if let Some(index) = xs
            .iter()
            .zip(ys)
            .position(|(x, y)| !x.is_finite() || !y.is_finite())
        {
            return Err(GridError::NonFinitePosition { index });
        }
        if xs.is_empty() {
            return Err(GridError::NotEnoughSamples { found: 0 });
        }

        let fold_min = |values: &[f64]| values.iter().copied().fold(f64::INFINITY, f64::min);
        let fold_max = |values: &[f64]| values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let (x_min, y_min) = (fold_min(xs), fold_min(ys));
        let scale = (fold_max(xs) - x_min).max(fold_max(ys) - y_min);
        if scale <= 0.0 {
            return Err(GridError::NotEnoughSamples { found: 1 });
        }
        let normaliser = Normaliser {
            origin: [x_min, y_min],
            scale,
        };

        // merge samples that share a position
        let mut vertex_of_key: HashMap<(i64, i64), usize> = HashMap::new();
        let mut points: Vec<Point> = vec![];
        let mut samples_per_vertex: Vec<usize> = vec![];
        let sample_vertex: Vec<usize> = xs
            .iter()
            .zip(ys)
            .map(|(&x, &y)| {
                let point = normaliser.apply(x, y);
                let key = (
                    (point[0] * 1e12).round() as i64,
                    (point[1] * 1e12).round() as i64,
                );
                let vertex = *vertex_of_key.entry(key).or_insert_with(|| {
                    points.push(point);
                    samples_per_vertex.push(0);
                    points.len() - 1
                });
                samples_per_vertex[vertex] += 1;
                vertex
            })
            .collect();
        if points.len() < 3 {
            return Err(GridError::NotEnoughSamples {
                found: points.len(),
            });
        }

        let triangulation = Triangulation::new(&points)?;
        let num_triangles = triangulation.num_triangles();
        if num_triangles == 0 {
            return Err(GridError::Degenerate);
        }
        let vertex_neighbours = triangulation.vertex_neighbours();

        let mut hint = None;
        let mut locations = Vec::with_capacity(axes.num_x * axes.num_y);
        for iy in 0..axes.num_y {
            for ix in 0..axes.num_x {
                let p = normaliser.apply(axes.x(ix), axes.y(iy));
                locations.push(triangulation.locate(p, &mut hint));
            }
        }
        trace!(
            "triangulated {} samples ({} distinct) into {} triangles, {}/{} grid points covered",
            xs.len(),
            points.len(),
            num_triangles,
            locations.iter().filter(|l| l.is_some()).count(),
            locations.len()
        );

        Ok(Self {
            axes,
            points,
            vertex_neighbours,
            sample_vertex,
            samples_per_vertex,
            locations,
        })
    }

    pub fn axes(&self) -> &GridAxes {
        &self.axes
    }

    pub fn num_samples(&self) -> usize {
        self.sample_vertex.len()
    }

    /// Number of grid points inside the convex hull of the samples.
    pub fn num_covered(&self) -> usize {
        self.locations.iter().filter(|l| l.is_some()).count()
    }

    /// Interpolate one value per sample onto the grid, returning an array of
    /// shape [`GridAxes::dim`].
    ///
    /// Samples sharing a position are averaged. Points outside the convex
    /// hull, or in a triangle with a non-finite corner value, are NaN.
    ///
    /// # Errors
    ///
    /// Fails if `values` doesn't have one entry per sample.
    pub fn grid(&self, values: &[f64]) -> Result<Array2<f64>, GridError> {
        if values.len() != self.num_samples() {
            return Err(GridError::ValueCount {
                expected: self.num_samples(),
                found: values.len(),
            });
        }
        let mut vertex_values = vec![0.0; self.samples_per_vertex.len()];
        for (&vertex, &value) in self.sample_vertex.iter().zip(values) {
            vertex_values[vertex] += value;
        }
        for (value, &count) in vertex_values.iter_mut().zip(&self.samples_per_vertex) {
            *value /= count as f64;
        }

        let points = &self.points;
        let gradients = estimate_gradients(points, &vertex_values, &self.vertex_neighbours);

        let num_x = self.axes.num_x;
        Ok(Array2::from_shape_fn(self.axes.dim(), |(iy, ix)| {
            match self.locations[iy * num_x + ix] {
                Some((corners, bary)) => {
                    eval_patch(
                        corners.map(|v| points[v]),
                        corners.map(|v| vertex_values[v]),
                        corners.map(|v| gradients[v]),
                        bary,
                    )
                }
                None => f64::NAN,
            }
        }))
    }
}
