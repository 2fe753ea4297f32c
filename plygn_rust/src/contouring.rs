use image::{imageops, GrayImage};
use imageproc::contours::{self, BorderType};

use crate::clustering::LabelImage;
use crate::geometry::Point;

const FOREGROUND: u8 = 255;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BorderKind {
    Outer,
    Hole,
}

/// Closed boundary of one connected region, one point per boundary pixel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Contour {
    pub points: Vec<Point>,
    pub kind: BorderKind,
    /// Index of the enclosing contour within the same group.
    pub parent: Option<usize>,
}

impl Contour {
    pub fn len(&self) -> usize { self.points.len() }
    pub fn is_empty(&self) -> bool { self.points.is_empty() }
}

/// All contours traced for one cluster label.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContourGroup {
    pub label: u8,
    pub contours: Vec<Contour>,
}

pub fn bitmask(labels: &LabelImage, label: u8) -> GrayImage {
    let data = labels.as_slice().iter().map(|&l| if l == label { FOREGROUND } else { 0 }).collect();
    // buffer length always matches the label image
    GrayImage::from_raw(labels.width(), labels.height(), data).unwrap_or_else(|| GrayImage::new(labels.width(), labels.height()))
}

/// Offsets of an elliptic structuring element inscribed in a `size` x `size` box,
/// anchored at `(size / 2, size / 2)`. Each row spans the rounded half-width of the
/// ellipse at that height, so a 5-pixel element has full-width rows at `dy = ±1`.
pub fn ellipse_offsets(size: usize) -> Vec<(i32, i32)> {
    let size = size.max(1) as i32;
    let r = size / 2;
    if r == 0 {
        return vec![(0, 0)];
    }
    let mut out = Vec::new();
    for row in 0..size {
        let dy = row - r;
        if dy.abs() > r {
            continue;
        }
        let half = (r as f64 * (((r * r - dy * dy) as f64) / (r * r) as f64).sqrt()).round_ties_even() as i32;
        let j1 = (r - half).max(0);
        let j2 = (r + half + 1).min(size);
        out.extend((j1..j2).map(|col| (col - r, dy)));
    }
    out
}

#[derive(Clone, Copy)]
enum Morph {
    Erode,
    Dilate,
}

// Binary erosion/dilation on 0/255 masks. Offsets that leave the image are
// skipped, so the border neither erodes nor grows the region.
fn morph(mask: &GrayImage, offsets: &[(i32, i32)], op: Morph) -> GrayImage {
    let (w, h) = (mask.width() as i32, mask.height() as i32);
    let src = mask.as_raw();
    let init = match op { Morph::Erode => FOREGROUND, Morph::Dilate => 0 };
    let mut out = vec![init; src.len()];
    for y in 0..h {
        let dst = &mut out[(y * w) as usize..((y + 1) * w) as usize];
        for &(dx, dy) in offsets {
            let sy = y + dy;
            if sy < 0 || sy >= h { continue; }
            let row = &src[(sy * w) as usize..((sy + 1) * w) as usize];
            let x0 = (-dx).max(0);
            let x1 = (w - dx).min(w);
            for x in x0..x1 {
                let v = row[(x + dx) as usize];
                let d = &mut dst[x as usize];
                match op {
                    Morph::Erode => *d &= v,
                    Morph::Dilate => *d |= v,
                }
            }
        }
    }
    GrayImage::from_raw(mask.width(), mask.height(), out).unwrap_or_else(|| mask.clone())
}

pub fn erode(mask: &GrayImage, offsets: &[(i32, i32)]) -> GrayImage { morph(mask, offsets, Morph::Erode) }
pub fn dilate(mask: &GrayImage, offsets: &[(i32, i32)]) -> GrayImage { morph(mask, offsets, Morph::Dilate) }

/// Opening followed by closing with an elliptic element: drops islands and fills
/// pinholes smaller than the kernel.
pub fn denoise_bitmask(mask: &GrayImage, kernel_size: usize) -> GrayImage {
    let kernel = ellipse_offsets(kernel_size);
    let opened = dilate(&erode(mask, &kernel), &kernel);
    erode(&dilate(&opened, &kernel), &kernel)
}

/// Trace every border of a 0/255 mask, with hole hierarchy.
///
/// The mask is traced inside a one-pixel background frame, so regions touching the
/// canvas edge get an outer border along it. Points are in mask coordinates.
pub fn trace_contours(mask: &GrayImage) -> Vec<Contour> {
    let (w, h) = mask.dimensions();
    let mut framed = GrayImage::new(w + 2, h + 2);
    imageops::replace(&mut framed, mask, 1, 1);
    contours::find_contours::<i32>(&framed)
        .into_iter()
        .map(|c| Contour {
            points: c.points.into_iter().map(|p| Point::new(p.x - 1, p.y - 1)).collect(),
            kind: match c.border_type {
                BorderType::Outer => BorderKind::Outer,
                BorderType::Hole => BorderKind::Hole,
            },
            parent: c.parent,
        })
        .collect()
}

/// Boundary polygons of every cluster region, grouped by label in label order.
pub fn find_contours(labels: &LabelImage, clusters: usize, noise_kernel: usize) -> Vec<ContourGroup> {
    (0..clusters.min(crate::clustering::MAX_CLUSTERS))
        .map(|k| {
            let label = k as u8;
            let mut mask = bitmask(labels, label);
            if noise_kernel > 0 {
                mask = denoise_bitmask(&mask, noise_kernel);
            }
            ContourGroup { label, contours: trace_contours(&mask) }
        })
        .collect()
}
