use anyhow::{bail, Context, Result};
use image::{DynamicImage, ImageReader, RgbImage};
use log::{debug, info, warn};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

pub mod clustering;
pub mod colorization;
pub mod colorspace;
pub mod contouring;
pub mod export;
pub mod geometry;
pub mod sampling;
pub mod subdivision;
pub mod triangulation;

pub use clustering::{dedupe_colors, expand_labels, weighted_kmeans, KmeansParams, LabelImage, MAX_CLUSTERS};
pub use colorization::{colorize, BarycentricBasis, ColorizeStats};
pub use colorspace::ColorSpace;
pub use contouring::{find_contours, BorderKind, Contour, ContourGroup};
pub use export::ExportFormat;
pub use geometry::{Point, Triangle};
pub use sampling::find_vertices;
pub use subdivision::split_triangulation;
pub use triangulation::find_triangulation;

/// File extensions picked up when the input is a directory.
pub const SUPPORTED_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "qoi"];

#[derive(Debug, Clone)]
pub struct Config {
    pub color_space: ColorSpace,
    /// Number of color clusters (K).
    pub clusters: usize,
    /// Preferred spacing between sampled contour vertices.
    pub vertex_distance: usize,
    /// Maximum triangle area after splitting; `<= 0` disables splitting.
    pub split_threshold: i64,
    /// Maximum color deviation inside a filled triangle; `<= 0` disables the gate.
    pub variance_threshold: f64,
    /// Size of the elliptic denoising kernel; 0 disables denoising.
    pub noise_kernel: usize,
    pub kmeans_iterations: usize,
    pub kmeans_runs: usize,
    pub seed: u64,
    pub num_threads: usize,
}

pub fn default_config() -> Config {
    Config {
        color_space: ColorSpace::Rgb,
        clusters: 8,
        vertex_distance: 10,
        split_threshold: -1,
        variance_threshold: -1.0,
        noise_kernel: 5,
        kmeans_iterations: 100,
        kmeans_runs: 10,
        seed: 42,
        num_threads: num_cpus::get().max(1),
    }
}

impl Default for Config {
    fn default() -> Self {
        default_config()
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.clusters == 0 {
            bail!("cluster count must be at least 1");
        }
        if self.clusters > MAX_CLUSTERS {
            bail!("cluster count {} exceeds the maximum of {}", self.clusters, MAX_CLUSTERS);
        }
        if self.vertex_distance == 0 {
            bail!("vertex distance must be at least 1");
        }
        if self.variance_threshold.is_nan() {
            bail!("variance threshold must be a number");
        }
        if self.kmeans_iterations == 0 {
            bail!("k-means iteration cap must be at least 1");
        }
        if self.kmeans_runs == 0 {
            bail!("k-means needs at least one run");
        }
        if self.num_threads == 0 {
            bail!("thread count must be at least 1");
        }
        Ok(())
    }

    pub fn kmeans_params(&self) -> KmeansParams {
        KmeansParams {
            clusters: self.clusters,
            max_iterations: self.kmeans_iterations,
            runs: self.kmeans_runs,
            seed: self.seed,
            num_threads: self.num_threads,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    ColorSpaceTransformation,
    ColorClustering,
    Contouring,
    VertexSearch,
    Triangulation,
    TriangleSplitting,
    TriangleColorization,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Self::ColorSpaceTransformation => "Color Space Transformation",
            Self::ColorClustering => "Color Clustering",
            Self::Contouring => "Contouring",
            Self::VertexSearch => "Vertex Search",
            Self::Triangulation => "Triangulation",
            Self::TriangleSplitting => "Triangle Splitting",
            Self::TriangleColorization => "Triangle Colorization",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Sent to the progress callback after each finished stage.
#[derive(Clone, Copy, Debug)]
pub struct StageReport {
    pub stage: Stage,
    /// 1-based position among the stages that actually ran.
    pub step: usize,
    pub elapsed: Duration,
}

struct Stages<'a> {
    step: usize,
    progress: &'a mut dyn FnMut(&StageReport),
}

impl Stages<'_> {
    fn run<T>(&mut self, stage: Stage, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let out = f();
        self.step += 1;
        let report = StageReport { stage, step: self.step, elapsed: start.elapsed() };
        debug!("stage {} ({}) took {:?}", report.step, stage, report.elapsed);
        (self.progress)(&report);
        out
    }
}

/// Everything the pipeline produced for one image.
#[derive(Clone, Debug)]
pub struct LowPoly {
    pub canvas: RgbImage,
    pub labels: LabelImage,
    pub contours: Vec<ContourGroup>,
    pub vertices: Vec<Point>,
    pub triangles: Vec<Triangle>,
    pub stats: ColorizeStats,
}

pub fn low_poly(image: &RgbImage, config: &Config) -> Result<LowPoly> {
    low_poly_with_progress(image, config, &mut |_: &StageReport| {})
}

/// Run the full stylization pipeline, reporting each stage to `progress`.
pub fn low_poly_with_progress(image: &RgbImage, config: &Config, progress: &mut dyn FnMut(&StageReport)) -> Result<LowPoly> {
    config.validate()?;
    let (w, h) = image.dimensions();
    if w < 2 || h < 2 {
        bail!("image must be at least 2x2 pixels, got {}x{}", w, h);
    }
    let mut stages = Stages { step: 0, progress };

    let (unique, points) = stages.run(Stage::ColorSpaceTransformation, || {
        let unique = dedupe_colors(image);
        let colors: Vec<[u8; 3]> = unique.iter().map(|u| u.color).collect();
        let points = config.color_space.project_all(&colors);
        (unique, points)
    });
    debug!("{} unique colors in {} space", unique.len(), config.color_space);

    let labels = stages.run(Stage::ColorClustering, || {
        let weights: Vec<f64> = unique.iter().map(|u| u.frequency as f64).collect();
        let clustering = weighted_kmeans(&points, &weights, &config.kmeans_params());
        debug!("k-means kept run {} (inertia {:.3}, {} iterations)", clustering.run, clustering.inertia, clustering.iterations);
        expand_labels(image, &unique, &clustering.labels, config.num_threads)
    });

    let contours = stages.run(Stage::Contouring, || find_contours(&labels, config.clusters, config.noise_kernel));
    let vertices = stages.run(Stage::VertexSearch, || find_vertices(&contours, config.vertex_distance));
    let mut triangles = stages.run(Stage::Triangulation, || find_triangulation(w, h, &vertices))?;
    if config.split_threshold > 0 {
        triangles = stages.run(Stage::TriangleSplitting, || split_triangulation(&triangles, config.split_threshold));
    }
    let colorized = stages.run(Stage::TriangleColorization, || colorize(image, &triangles, config.variance_threshold, config.num_threads));

    info!(
        "{} contours, {} vertices, {} triangles ({} filled)",
        contours.iter().map(|g| g.contours.len()).sum::<usize>(),
        vertices.len(),
        triangles.len(),
        colorized.stats.filled
    );
    Ok(LowPoly { canvas: colorized.canvas, labels, contours, vertices, triangles, stats: colorized.stats })
}

/// Core algorithm on an in-memory image, returning only the stylized canvas.
pub fn process_dynamic(dyn_img: &DynamicImage, config: Config) -> Result<RgbImage> {
    info!("Starting plygn (Rust) in-memory");
    info!("Color space: {}, clusters: {}", config.color_space, config.clusters);
    let rgb = dyn_img.to_rgb8();
    Ok(low_poly(&rgb, &config)?.canvas)
}

#[derive(Debug, Clone)]
pub struct Params {
    /// Image file or directory of images.
    pub input: PathBuf,
    /// Existing output directory.
    pub output: PathBuf,
    pub formats: Vec<ExportFormat>,
    pub export_unprocessed: bool,
    pub export_contours: bool,
    pub export_triangulation: bool,
    pub config: Config,
}

pub fn load_image(path: &Path) -> Result<RgbImage> {
    let img = ImageReader::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?
        .with_guessed_format()
        .with_context(|| format!("failed to read {}", path.display()))?
        .decode()
        .with_context(|| format!("failed to decode {}", path.display()))?;
    Ok(img.to_rgb8())
}

/// Name used for output files: the file name up to its first dot.
pub fn image_name(path: &Path) -> String {
    let file = path.file_name().and_then(|s| s.to_str()).unwrap_or("image");
    file.split('.').next().filter(|s| !s.is_empty()).unwrap_or(file).to_string()
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// The input file itself, or every supported image in the input directory (sorted).
pub fn collect_inputs(input: &Path) -> Result<Vec<PathBuf>> {
    if input.is_file() {
        return Ok(vec![input.to_path_buf()]);
    }
    if !input.is_dir() {
        bail!("input {} does not exist", input.display());
    }
    let mut files = Vec::new();
    for entry in std::fs::read_dir(input).with_context(|| format!("failed to list {}", input.display()))? {
        let path = entry?.path();
        if path.is_file() && is_supported(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn process_image(path: &Path, params: &Params) -> Result<()> {
    info!("Input image: {}", path.display());
    let image = load_image(path)?;
    let name = image_name(path);

    let start = Instant::now();
    let result = low_poly_with_progress(&image, &params.config, &mut |r: &StageReport| {
        info!("{}. {} {:.3}s", r.step, r.stage, r.elapsed.as_secs_f64());
    })?;
    info!("Processing time: {:.3}s", start.elapsed().as_secs_f64());

    if params.export_contours || params.export_triangulation {
        let folder = export::debug_folder(&params.output, &name, params.config.color_space)?;
        if params.export_contours {
            export::export_contours(&folder, &image, &result.contours)?;
        }
        if params.export_triangulation {
            export::export_triangulation(&folder, &image, &result.triangles)?;
        }
    }

    let written = export::export(&params.output, &name, &result.canvas, &image, &params.formats, params.export_unprocessed)?;
    for p in &written {
        info!("Output saved: {}", p.display());
    }
    info!("Total time: {:.3}s", start.elapsed().as_secs_f64());
    Ok(())
}

/// Stylize one image or a directory of images and export the results.
/// Returns the number of images processed; failing images are skipped.
pub fn process(params: Params) -> Result<usize> {
    params.config.validate()?;
    if !params.output.is_dir() {
        bail!("output directory {} does not exist", params.output.display());
    }
    if params.formats.is_empty() {
        bail!("no export format selected");
    }
    info!("Starting plygn (Rust)");
    info!("Color space: {}, clusters: {}, vertex distance: {}", params.config.color_space, params.config.clusters, params.config.vertex_distance);

    let inputs = collect_inputs(&params.input)?;
    if inputs.is_empty() {
        warn!("no supported images found in {}", params.input.display());
    }
    export::write_parameters(&params.output, &params)?;

    let mut processed = 0usize;
    for path in &inputs {
        match process_image(path, &params) {
            Ok(()) => processed += 1,
            Err(e) => warn!("skipping {}: {:#}", path.display(), e),
        }
    }
    info!("Processed {} of {} images", processed, inputs.len());
    Ok(processed)
}
