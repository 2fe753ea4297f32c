// CLI entry for plygn
use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueHint};
use log::info;
use plygn_rust::{default_config, process, ColorSpace, Config, ExportFormat, Params};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "plygn", version, about = "Low-poly image stylization (Rust core)")]
struct Cli {
    /// Input image, or a directory of images
    #[arg(short = 'i', long = "input", value_hint = ValueHint::AnyPath)]
    input: PathBuf,
    /// Existing output directory
    #[arg(short = 'o', long = "output", value_hint = ValueHint::DirPath)]
    output: PathBuf,

    /// Clustering color space (rgb, hsv, hsl)
    #[arg(short = 'c', long = "colorspace")]
    colorspace: Option<String>,
    /// Preferred distance between contour vertices
    #[arg(short = 'd', long = "distance")]
    distance: Option<usize>,
    /// Maximum triangle area before splitting (<= 0 disables)
    #[arg(short = 's', long = "splitting", allow_negative_numbers = true)]
    splitting: Option<i64>,
    /// Maximum color deviation inside a filled triangle (<= 0 disables)
    #[arg(short = 'v', long = "variance", allow_negative_numbers = true)]
    variance: Option<f64>,
    /// Denoising kernel diameter (0 disables)
    #[arg(short = 'n', long = "noise-kernel")]
    noise_kernel: Option<usize>,
    /// Number of color clusters
    #[arg(short = 'k', long = "kmeans")]
    kmeans: Option<usize>,
    /// Seed for k-means initialisation
    #[arg(long = "seed")]
    seed: Option<u64>,
    /// Number of threads
    #[arg(long = "threads")]
    threads: Option<usize>,
    /// k-means iteration cap
    #[arg(long = "kmeans-iterations")]
    kmeans_iterations: Option<usize>,
    /// k-means restarts
    #[arg(long = "kmeans-runs")]
    kmeans_runs: Option<usize>,

    /// Export formats (jpg, png, qoi)
    #[arg(short = 'f', long = "formats", num_args = 1.., default_value = "jpg")]
    formats: Vec<String>,
    /// Also export the unprocessed image
    #[arg(short = 'U', long = "export-unprocessed", action = ArgAction::SetTrue)]
    export_unprocessed: bool,
    /// Export contour overlays
    #[arg(short = 'C', long = "export-contours", action = ArgAction::SetTrue)]
    export_contours: bool,
    /// Export the triangle wireframe
    #[arg(short = 'T', long = "export-triangulation", action = ArgAction::SetTrue)]
    export_triangulation: bool,
}

fn build_config(cli: &Cli) -> Result<Config> {
    let mut cfg = default_config();
    if let Some(v) = &cli.colorspace { cfg.color_space = v.parse::<ColorSpace>()?; }
    if let Some(v) = cli.distance { cfg.vertex_distance = v; }
    if let Some(v) = cli.splitting { cfg.split_threshold = v; }
    if let Some(v) = cli.variance { cfg.variance_threshold = v; }
    if let Some(v) = cli.noise_kernel { cfg.noise_kernel = v; }
    if let Some(v) = cli.kmeans { cfg.clusters = v; }
    if let Some(v) = cli.seed { cfg.seed = v; }
    if let Some(v) = cli.threads { cfg.num_threads = v.max(1); }
    if let Some(v) = cli.kmeans_iterations { cfg.kmeans_iterations = v; }
    if let Some(v) = cli.kmeans_runs { cfg.kmeans_runs = v; }
    cfg.validate().context("invalid parameters")?;
    Ok(cfg)
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let config = build_config(&cli)?;
    let formats = cli.formats.iter().map(|f| f.parse::<ExportFormat>()).collect::<Result<Vec<_>>>()?;
    let params = Params {
        input: cli.input,
        output: cli.output,
        formats,
        export_unprocessed: cli.export_unprocessed,
        export_contours: cli.export_contours,
        export_triangulation: cli.export_triangulation,
        config,
    };
    let processed = process(params)?;
    info!("Done: {} image(s) written", processed);
    Ok(())
}
