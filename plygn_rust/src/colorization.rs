use image::{Rgb, RgbImage};
use log::debug;
use std::thread;

use crate::geometry::{Point, Triangle};

/// Inclusive pixel bounding box.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundingBox {
    pub xmin: i32,
    pub ymin: i32,
    pub xmax: i32,
    pub ymax: i32,
}

impl BoundingBox {
    pub fn of(t: &Triangle) -> Self {
        let [a, b, c] = t.vertices();
        Self {
            xmin: a.x.min(b.x).min(c.x),
            ymin: a.y.min(b.y).min(c.y),
            xmax: a.x.max(b.x).max(c.x),
            ymax: a.y.max(b.y).max(c.y),
        }
    }

    /// Intersection with a `width` x `height` canvas; `None` when nothing is left.
    pub fn clip(self, width: u32, height: u32) -> Option<Self> {
        let b = Self {
            xmin: self.xmin.max(0),
            ymin: self.ymin.max(0),
            xmax: self.xmax.min(width as i32 - 1),
            ymax: self.ymax.min(height as i32 - 1),
        };
        (b.xmin <= b.xmax && b.ymin <= b.ymax).then_some(b)
    }

    pub fn points(self) -> impl Iterator<Item = (i32, i32)> {
        (self.ymin..=self.ymax).flat_map(move |y| (self.xmin..=self.xmax).map(move |x| (x, y)))
    }
}

/// Triangle-dependent part of the barycentric coordinates, computed once per triangle.
/// The weights `v` (toward `b`) and `w` (toward `c`) are kept as integer numerators
/// over the determinant `den`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BarycentricBasis {
    origin: Point,
    v0: (i64, i64),
    v1: (i64, i64),
    den: i64,
}

impl BarycentricBasis {
    pub fn new(t: &Triangle) -> Self {
        let v0 = ((t.b.x - t.a.x) as i64, (t.b.y - t.a.y) as i64);
        let v1 = ((t.c.x - t.a.x) as i64, (t.c.y - t.a.y) as i64);
        let den = v0.0 * v1.1 - v1.0 * v0.1;
        Self { origin: t.a, v0, v1, den }
    }

    /// Zero determinant: the vertices are collinear or repeated.
    pub fn is_degenerate(&self) -> bool {
        self.den == 0
    }

    #[inline]
    fn numerators(&self, x: i32, y: i32) -> (i64, i64) {
        let v2 = ((x - self.origin.x) as i64, (y - self.origin.y) as i64);
        (v2.0 * self.v1.1 - self.v1.0 * v2.1, self.v0.0 * v2.1 - v2.0 * self.v0.1)
    }

    /// `v >= 0 && w >= 0 && v + w <= 1`, edges included. Checked on the integer
    /// numerators scaled by the determinant, so pixels exactly on an edge are never
    /// lost to rounding and a shared edge belongs to both triangles.
    #[inline]
    pub fn contains(&self, x: i32, y: i32) -> bool {
        if self.den == 0 {
            return false;
        }
        let (nv, nw) = self.numerators(x, y);
        if self.den > 0 {
            nv >= 0 && nw >= 0 && nv + nw <= self.den
        } else {
            nv <= 0 && nw <= 0 && nv + nw >= self.den
        }
    }
}

/// Outcome of the read-only phase for one triangle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Shade {
    /// No pixel inside: degenerate or off-canvas.
    Empty,
    /// Colors deviate from the mean by more than the variance threshold.
    Gated { max_deviation: f64 },
    Fill { color: [u8; 3], pixels: u64 },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ColorizeStats {
    pub filled: usize,
    pub empty: usize,
    pub gated: usize,
}

impl ColorizeStats {
    pub fn unfilled(&self) -> usize {
        self.empty + self.gated
    }
}

/// Mean color of the pixels covered by `t`, and whether it passes the variance gate.
pub fn shade_triangle(image: &RgbImage, t: &Triangle, variance: f64) -> Shade {
    let basis = BarycentricBasis::new(t);
    let Some(bbox) = BoundingBox::of(t).clip(image.width(), image.height()) else {
        return Shade::Empty;
    };
    if basis.is_degenerate() {
        return Shade::Empty;
    }

    let inside = || bbox.points().filter(|&(x, y)| basis.contains(x, y)).map(|(x, y)| image.get_pixel(x as u32, y as u32).0);

    let mut sum = [0u64; 3];
    let mut size = 0u64;
    for px in inside() {
        sum[0] += px[0] as u64;
        sum[1] += px[1] as u64;
        sum[2] += px[2] as u64;
        size += 1;
    }
    if size == 0 {
        return Shade::Empty;
    }
    let color = [(sum[0] / size) as u8, (sum[1] / size) as u8, (sum[2] / size) as u8];

    if variance > 0.0 {
        let max_deviation = inside().map(|px| color_distance(px, color)).fold(0.0f64, f64::max);
        if max_deviation > variance {
            return Shade::Gated { max_deviation };
        }
    }
    Shade::Fill { color, pixels: size }
}

#[inline]
pub fn color_distance(a: [u8; 3], b: [u8; 3]) -> f64 {
    let d = |i: usize| a[i] as f64 - b[i] as f64;
    (d(0) * d(0) + d(1) * d(1) + d(2) * d(2)).sqrt()
}

fn fill_triangle(canvas: &mut RgbImage, t: &Triangle, color: [u8; 3]) {
    let basis = BarycentricBasis::new(t);
    if let Some(bbox) = BoundingBox::of(t).clip(canvas.width(), canvas.height()) {
        for (x, y) in bbox.points().filter(|&(x, y)| basis.contains(x, y)) {
            canvas.put_pixel(x as u32, y as u32, Rgb(color));
        }
    }
}

pub struct Colorized {
    pub canvas: RgbImage,
    pub stats: ColorizeStats,
}

/// Flat-fill every triangle with the mean color of the pixels it covers.
///
/// Shading runs on `num_threads` workers over contiguous chunks of the list;
/// fills are then written in list order, so where triangles share edge pixels
/// the later triangle wins, exactly as in a single-threaded pass.
/// A non-positive `variance` disables the gate.
pub fn colorize(image: &RgbImage, triangles: &[Triangle], variance: f64, num_threads: usize) -> Colorized {
    let mut canvas = image.clone();
    let mut stats = ColorizeStats::default();
    if triangles.is_empty() {
        return Colorized { canvas, stats };
    }

    let chunk = triangles.len().div_ceil(num_threads.max(1)).max(1);
    let shades: Vec<Shade> = thread::scope(|s| {
        let handles: Vec<_> = triangles
            .chunks(chunk)
            .map(|part| s.spawn(move || part.iter().map(|t| shade_triangle(image, t, variance)).collect::<Vec<_>>()))
            .collect();
        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
            .collect()
    });

    for (t, shade) in triangles.iter().zip(&shades) {
        match *shade {
            Shade::Empty => stats.empty += 1,
            Shade::Gated { .. } => stats.gated += 1,
            Shade::Fill { color, .. } => {
                fill_triangle(&mut canvas, t, color);
                stats.filled += 1;
            }
        }
    }
    debug!("colorization: {} filled, {} empty, {} gated", stats.filled, stats.empty, stats.gated);
    Colorized { canvas, stats }
}
