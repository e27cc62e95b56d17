//! Delaunay triangulation of scattered points, and point location in it.
//!
//! Points are expected to be normalised into the unit square. Vertices keep
//! the index of the point they were made from, so callers never see the
//! triangulation's own handles.

use spade::{
    handles::FixedVertexHandle, DelaunayTriangulation, HasPosition, Point2,
    PositionInTriangulation, Triangulation as _,
};

use super::GridError;

pub(crate) type Point = [f64; 2];

/// Twice the signed area of `abc`; positive when counter-clockwise.
#[inline]
fn orient(a: Point, b: Point, c: Point) -> f64 {
    (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0])
}

#[derive(Clone, Copy, Debug)]
struct Vertex {
    position: Point,
    index: usize,
}

impl HasPosition for Vertex {
    type Scalar = f64;

    fn position(&self) -> Point2<f64> {
        Point2::new(self.position[0], self.position[1])
    }
}

/// The triangle containing a point: its corners, as point indices, and the
/// barycentric coordinates of the point.
pub(crate) type Location = ([usize; 3], [f64; 3]);

pub(crate) struct Triangulation {
    inner: DelaunayTriangulation<Vertex>,
    num_points: usize,
}

impl std::fmt::Debug for Triangulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Triangulation")
            .field("num_points", &self.num_points)
            .field("num_triangles", &self.num_triangles())
            .finish()
    }
}

impl Triangulation {
    /// Triangulate `points`, which must be distinct.
    pub(crate) fn new(points: &[Point]) -> Result<Triangulation, GridError> {
        let mut inner = DelaunayTriangulation::<Vertex>::new();
        for (index, &position) in points.iter().enumerate() {
            inner
                .insert(Vertex { position, index })
                .map_err(|reason| GridError::Unplaceable { index, reason })?;
        }
        Ok(Triangulation {
            inner,
            num_points: points.len(),
        })
    }

    pub(crate) fn num_triangles(&self) -> usize {
        self.inner.num_inner_faces()
    }

    /// The points joined to each point by an edge.
    pub(crate) fn vertex_neighbours(&self) -> Vec<Vec<usize>> {
        let mut neighbours = vec![vec![]; self.num_points];
        for vertex in self.inner.vertices() {
            neighbours[vertex.data().index] = vertex
                .out_edges()
                .map(|edge| edge.to().data().index)
                .collect();
        }
        neighbours
    }

    /// Find the triangle containing `p`, or `None` outside the convex hull.
    /// Points on an edge or a vertex belong to any triangle touching it.
    ///
    /// `hint` is a vertex near `p`, and is updated to one near the result so
    /// that a walk over neighbouring points is cheap.
    pub(crate) fn locate(&self, p: Point, hint: &mut Option<FixedVertexHandle>) -> Option<Location> {
        let target = Point2::new(p[0], p[1]);
        let position = match *hint {
            Some(vertex) => self.inner.locate_with_hint(target, vertex),
            None => self.inner.locate(target),
        };
        let face = match position {
            PositionInTriangulation::OnFace(face) => self.inner.face(face),
            PositionInTriangulation::OnEdge(edge) => {
                let edge = self.inner.directed_edge(edge);
                edge.face().as_inner().or_else(|| edge.rev().face().as_inner())?
            }
            PositionInTriangulation::OnVertex(vertex) => self
                .inner
                .vertex(vertex)
                .out_edges()
                .find_map(|edge| edge.face().as_inner())?,
            PositionInTriangulation::OutsideOfConvexHull(edge) => {
                *hint = Some(self.inner.directed_edge(edge).from().fix());
                return None;
            }
            PositionInTriangulation::NoTriangulation => return None,
        };

        let [a, b, c] = face.vertices().map(|vertex| *vertex.data());
        *hint = Some(face.vertices()[0].fix());
        let area = orient(a.position, b.position, c.position);
        let u = orient(b.position, c.position, p) / area;
        let v = orient(c.position, a.position, p) / area;
        Some(([a.index, b.index, c.index], [u, v, 1.0 - u - v]))
    }
}
