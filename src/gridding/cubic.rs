//! Piecewise cubic interpolation on a triangulation.
//!
//! Each triangle carries a cubic Bézier patch built from the values and
//! estimated gradients at its corners. The patches join continuously across
//! edges and reproduce quadratic surfaces exactly.

use nalgebra::{DMatrix, DVector};

use super::delaunay::Point;

/// Below this many usable neighbours the 1-ring isn't tried for a quadratic fit.
const MIN_QUADRATIC_STENCIL: usize = 6;

/// Fits whose smallest singular value is below this fraction of the largest
/// are rank deficient.
const RANK_TOLERANCE: f64 = 1e-8;

/// Weighted least squares fit of `df = basis(dx, dy) . coeffs`, with weights
/// 1 / distance². `None` if the samples don't determine every coefficient.
fn weighted_fit<const N: usize>(
    samples: &[(f64, f64, f64)],
    basis: impl Fn(f64, f64) -> [f64; N],
) -> Option<[f64; N]> {
    if samples.len() < N {
        return None;
    }
    let mut design = DMatrix::<f64>::zeros(samples.len(), N);
    let mut rhs = DVector::<f64>::zeros(samples.len());
    for (row, &(dx, dy, df)) in samples.iter().enumerate() {
        let sqrt_weight = 1.0 / dx.hypot(dy);
        for (col, term) in basis(dx, dy).into_iter().enumerate() {
            design[(row, col)] = sqrt_weight * term;
        }
        rhs[row] = sqrt_weight * df;
    }

    let svd = design.svd(true, true);
    let largest = svd.singular_values.max();
    if !(largest.is_finite() && largest > 0.0)
        || svd.singular_values.min() <= RANK_TOLERANCE * largest
    {
        return None;
    }
    let solution = svd.solve(&rhs, RANK_TOLERANCE * largest).ok()?;
    let mut coeffs = [0.0; N];
    for (coeff, &value) in coeffs.iter_mut().zip(solution.iter()) {
        *coeff = value;
    }
    Some(coeffs)
}

/// The finite-valued neighbours of `vertex`, out to `depth` edges away.
fn stencil(vertex: usize, values: &[f64], neighbours: &[Vec<usize>], depth: usize) -> Vec<usize> {
    let mut ring: Vec<usize> = neighbours[vertex].clone();
    for _ in 1..depth {
        let outer: Vec<usize> = ring
            .iter()
            .flat_map(|&nb| neighbours[nb].iter().copied())
            .collect();
        ring.extend(outer);
        ring.sort_unstable();
        ring.dedup();
    }
    ring.retain(|&idx| idx != vertex && values[idx].is_finite());
    ring
}

/// Offsets of the stencil from `vertex`, in units of their mean distance,
/// with that distance.
fn scaled_offsets(
    vertex: usize,
    stencil: &[usize],
    points: &[Point],
    values: &[f64],
) -> (Vec<(f64, f64, f64)>, f64) {
    let origin = points[vertex];
    let offsets: Vec<(f64, f64, f64)> = stencil
        .iter()
        .map(|&idx| {
            (
                points[idx][0] - origin[0],
                points[idx][1] - origin[1],
                values[idx] - values[vertex],
            )
        })
        .collect();
    let radius = offsets
        .iter()
        .map(|&(dx, dy, _)| dx.hypot(dy))
        .sum::<f64>()
        / offsets.len().max(1) as f64;
    let scaled = offsets
        .into_iter()
        .map(|(dx, dy, df)| (dx / radius, dy / radius, df))
        .collect();
    (scaled, radius)
}

fn vertex_gradient(
    vertex: usize,
    points: &[Point],
    values: &[f64],
    neighbours: &[Vec<usize>],
) -> [f64; 2] {
    if !values[vertex].is_finite() {
        return [f64::NAN; 2];
    }

    // Prefer a quadratic fit over the 1-ring. When it has too few points, or
    // they don't pin down the curvature (e.g. they lie on two parallel
    // tracks), widen to the 2-ring.
    let one_ring = stencil(vertex, values, neighbours, 1);
    let mut stencils = vec![];
    if one_ring.len() >= MIN_QUADRATIC_STENCIL {
        stencils.push(one_ring);
    }
    stencils.push(stencil(vertex, values, neighbours, 2));

    let mut widest = (vec![], 1.0);
    for ring in &stencils {
        let (scaled, radius) = scaled_offsets(vertex, ring, points, values);
        if scaled.len() >= 5 {
            if let Some(c) = weighted_fit(&scaled, |x, y| [x, y, x * x, x * y, y * y]) {
                return [c[0] / radius, c[1] / radius];
            }
        }
        widest = (scaled, radius);
    }
    let (scaled, radius) = widest;
    weighted_fit(&scaled, |x, y| [x, y]).map_or([0.0; 2], |[gx, gy]| [gx / radius, gy / radius])
}

/// Estimate the gradient of the underlying surface at every vertex.
///
/// Vertices with a non-finite value get a NaN gradient. Neighbours with
/// non-finite values are left out of the fit.
pub(crate) fn estimate_gradients(
    points: &[Point],
    values: &[f64],
    neighbours: &[Vec<usize>],
) -> Vec<[f64; 2]> {
    (0..points.len())
        .map(|vertex| vertex_gradient(vertex, points, values, neighbours))
        .collect()
}

#[inline]
fn directional(gradient: [f64; 2], from: Point, to: Point) -> f64 {
    (gradient[0] * (to[0] - from[0]) + gradient[1] * (to[1] - from[1])) / 3.0
}

/// Evaluate the cubic patch over a triangle at barycentric coordinates `bary`.
pub(crate) fn eval_patch(
    corners: [Point; 3],
    values: [f64; 3],
    gradients: [[f64; 2]; 3],
    bary: [f64; 3],
) -> f64 {
    let [p1, p2, p3] = corners;
    let [f1, f2, f3] = values;
    let [g1, g2, g3] = gradients;

    let b210 = f1 + directional(g1, p1, p2);
    let b120 = f2 + directional(g2, p2, p1);
    let b021 = f2 + directional(g2, p2, p3);
    let b012 = f3 + directional(g3, p3, p2);
    let b102 = f3 + directional(g3, p3, p1);
    let b201 = f1 + directional(g1, p1, p3);
    let edges = (b210 + b120 + b021 + b012 + b102 + b201) / 6.0;
    let corner_mean = (f1 + f2 + f3) / 3.0;
    let b111 = edges + (edges - corner_mean) / 2.0;

    let [u, v, w] = bary;
    u * u * u * f1
        + v * v * v * f2
        + w * w * w * f3
        + 3.0 * u * u * v * b210
        + 3.0 * u * v * v * b120
        + 3.0 * v * v * w * b021
        + 3.0 * v * w * w * b012
        + 3.0 * u * w * w * b102
        + 3.0 * u * u * w * b201
        + 6.0 * u * v * w * b111
}
