use anyhow::{Context, Result};
use log::debug;
use spade::{DelaunayTriangulation, Point2, Triangulation};

use crate::geometry::{Point, Triangle};

/// The four canvas corners, always inserted so the hull equals the canvas.
pub fn canvas_corners(width: u32, height: u32) -> [Point; 4] {
    let (xmax, ymax) = (width.saturating_sub(1) as i32, height.saturating_sub(1) as i32);
    [Point::new(0, 0), Point::new(0, ymax), Point::new(xmax, 0), Point::new(xmax, ymax)]
}

#[inline]
fn to_point(p: Point2<f64>) -> Point {
    Point::new(p.x.round() as i32, p.y.round() as i32)
}

/// Delaunay triangulation of `vertices` plus the canvas corners.
///
/// Sites at an already occupied position resolve to the existing vertex, so
/// repeated coordinates are merged rather than rejected. Triangles are returned
/// in the triangulation's face order.
pub fn find_triangulation(width: u32, height: u32, vertices: &[Point]) -> Result<Vec<Triangle>> {
    let mut dt: DelaunayTriangulation<Point2<f64>> = DelaunayTriangulation::new();
    let corners = canvas_corners(width, height);
    for v in vertices.iter().chain(corners.iter()) {
        dt.insert(Point2::new(v.x as f64, v.y as f64))
            .with_context(|| format!("failed to insert triangulation site ({}, {})", v.x, v.y))?;
    }
    debug!("triangulation: {} sites, {} unique", vertices.len() + corners.len(), dt.num_vertices());

    let mut triangles: Vec<Triangle> = dt
        .inner_faces()
        .map(|face| {
            let [a, b, c] = face.vertices();
            Triangle::new(to_point(a.position()), to_point(b.position()), to_point(c.position()))
        })
        .collect();

    // Collinear corners on a one-pixel-wide canvas leave no inner face.
    if triangles.is_empty() {
        triangles.push(Triangle::new(corners[0], corners[2], corners[3]));
    }
    Ok(triangles)
}
