use anyhow::{bail, Context, Error, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::colorspace::ColorSpace;
use crate::contouring::{Contour, ContourGroup};
use crate::geometry::Triangle;
use crate::Params;

pub const JPEG_QUALITY: u8 = 90;
pub const CONTOUR_COLOR: Rgb<u8> = Rgb([255, 0, 255]);
pub const WIREFRAME_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExportFormat {
    #[default]
    Jpg,
    Png,
    Qoi,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpg => "jpg",
            Self::Png => "png",
            Self::Qoi => "qoi",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(Self::Jpg),
            "png" => Ok(Self::Png),
            "qoi" => Ok(Self::Qoi),
            other => bail!("unsupported export format '{}' (expected jpg, png or qoi)", other),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

pub fn save_image(image: &RgbImage, path: &Path, format: ExportFormat) -> Result<()> {
    match format {
        ExportFormat::Jpg => {
            let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY)
                .encode_image(image)
                .with_context(|| format!("failed to encode {}", path.display()))?;
            writer.flush().with_context(|| format!("failed to write {}", path.display()))?;
        }
        ExportFormat::Png => image.save_with_format(path, ImageFormat::Png).with_context(|| format!("failed to save {}", path.display()))?,
        ExportFormat::Qoi => image.save_with_format(path, ImageFormat::Qoi).with_context(|| format!("failed to save {}", path.display()))?,
    }
    Ok(())
}

/// Write `<name>_processed.<ext>` (and `<name>_unprocessed.<ext>`) for every format.
pub fn export(dir: &Path, name: &str, processed: &RgbImage, original: &RgbImage, formats: &[ExportFormat], export_unprocessed: bool) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for &format in formats {
        let path = dir.join(format!("{}_processed.{}", name, format.extension()));
        save_image(processed, &path, format)?;
        written.push(path);
        if export_unprocessed {
            let path = dir.join(format!("{}_unprocessed.{}", name, format.extension()));
            save_image(original, &path, format)?;
            written.push(path);
        }
    }
    Ok(written)
}

pub fn make_folder(parent: &Path, name: &str) -> Result<PathBuf> {
    let path = parent.join(name);
    fs::create_dir_all(&path).with_context(|| format!("failed to create folder {}", path.display()))?;
    Ok(path)
}

/// `<output>/<image name>/<color space>/`, created on demand.
pub fn debug_folder(output: &Path, image_name: &str, color_space: ColorSpace) -> Result<PathBuf> {
    let image_dir = make_folder(output, image_name)?;
    make_folder(&image_dir, &color_space.to_string())
}

pub fn draw_contour(canvas: &mut RgbImage, contour: &Contour, color: Rgb<u8>) {
    let (w, h) = canvas.dimensions();
    for p in &contour.points {
        if p.x >= 0 && p.y >= 0 && (p.x as u32) < w && (p.y as u32) < h {
            canvas.put_pixel(p.x as u32, p.y as u32, color);
        }
    }
}

pub fn draw_triangles(canvas: &mut RgbImage, triangles: &[Triangle], color: Rgb<u8>) {
    for t in triangles {
        let [a, b, c] = t.vertices();
        for (p, q) in [(a, b), (b, c), (c, a)] {
            draw_line_segment_mut(canvas, (p.x as f32, p.y as f32), (q.x as f32, q.y as f32), color);
        }
    }
}

/// One overlay per cluster (`cluster_<label>.png`) plus `combined.png` with every contour.
pub fn export_contours(folder: &Path, image: &RgbImage, groups: &[ContourGroup]) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(groups.len() + 1);
    let mut combined = image.clone();
    for group in groups {
        let mut overlay = image.clone();
        for contour in &group.contours {
            draw_contour(&mut overlay, contour, CONTOUR_COLOR);
            draw_contour(&mut combined, contour, CONTOUR_COLOR);
        }
        let path = folder.join(format!("cluster_{}.png", group.label));
        save_image(&overlay, &path, ExportFormat::Png)?;
        written.push(path);
    }
    let path = folder.join("combined.png");
    save_image(&combined, &path, ExportFormat::Png)?;
    written.push(path);
    Ok(written)
}

pub fn export_triangulation(folder: &Path, image: &RgbImage, triangles: &[Triangle]) -> Result<PathBuf> {
    let mut overlay = image.clone();
    draw_triangles(&mut overlay, triangles, WIREFRAME_COLOR);
    let path = folder.join("triangulated.png");
    save_image(&overlay, &path, ExportFormat::Png)?;
    Ok(path)
}

/// Record the run's settings as `parameters.txt` next to the outputs.
pub fn write_parameters(dir: &Path, params: &Params) -> Result<PathBuf> {
    let c = &params.config;
    let formats: Vec<String> = params.formats.iter().map(|f| f.to_string()).collect();
    let text = format!(
        "input: {}\ncolorspace: {}\nclusters: {}\ndistance: {}\nsplitting: {}\nvariance: {}\nnoise_kernel: {}\nkmeans_iterations: {}\nkmeans_runs: {}\nseed: {}\nthreads: {}\nformats: {}\n",
        params.input.display(),
        c.color_space,
        c.clusters,
        c.vertex_distance,
        c.split_threshold,
        c.variance_threshold,
        c.noise_kernel,
        c.kmeans_iterations,
        c.kmeans_runs,
        c.seed,
        c.num_threads,
        formats.join(", "),
    );
    let path = dir.join("parameters.txt");
    fs::write(&path, text).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}
