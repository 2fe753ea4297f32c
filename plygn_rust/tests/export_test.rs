use image::{ImageBuffer, Rgb, RgbImage};
use plygn_rust::{default_config, image_name, load_image, low_poly, process, Config, ExportFormat, Params};
use std::fs;
use std::path::Path;

fn test_image() -> RgbImage {
    ImageBuffer::from_fn(24, 18, |x, y| if x < 12 { Rgb([200, 60, 40]) } else if y < 9 { Rgb([30, 90, 220]) } else { Rgb([250, 250, 250]) })
}

fn config() -> Config {
    Config { clusters: 3, kmeans_runs: 2, num_threads: 2, ..default_config() }
}

fn params(input: &Path, output: &Path) -> Params {
    Params {
        input: input.to_path_buf(),
        output: output.to_path_buf(),
        formats: vec![ExportFormat::Png, ExportFormat::Jpg],
        export_unprocessed: true,
        export_contours: true,
        export_triangulation: true,
        config: config(),
    }
}

#[test]
fn single_image_writes_every_artifact() {
    let in_dir = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    let input = in_dir.path().join("scene.png");
    test_image().save(&input).unwrap();

    let processed = process(params(&input, out_dir.path())).expect("process should succeed");
    assert_eq!(processed, 1);

    let out = out_dir.path();
    for file in ["scene_processed.png", "scene_processed.jpg", "scene_unprocessed.png", "scene_unprocessed.jpg", "parameters.txt"] {
        assert!(out.join(file).is_file(), "missing {file}");
    }
    let debug = out.join("scene").join("RGB");
    for file in ["cluster_0.png", "cluster_1.png", "cluster_2.png", "combined.png", "triangulated.png"] {
        assert!(debug.join(file).is_file(), "missing {file}");
    }

    // png is lossless, so the export matches the in-memory canvas
    let expected = low_poly(&test_image(), &config()).unwrap().canvas;
    assert_eq!(load_image(&out.join("scene_processed.png")).unwrap(), expected);
    assert_eq!(load_image(&out.join("scene_unprocessed.png")).unwrap(), test_image());

    let text = fs::read_to_string(out.join("parameters.txt")).unwrap();
    assert!(text.contains("clusters: 3"));
    assert!(text.contains("formats: png, jpg"));
}

#[test]
fn batch_skips_failing_images() {
    let in_dir = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    test_image().save(in_dir.path().join("a.png")).unwrap();
    test_image().save(in_dir.path().join("b.bmp")).unwrap();
    fs::write(in_dir.path().join("broken.png"), b"not an image").unwrap();
    ImageBuffer::from_fn(1, 1, |_, _| Rgb([0u8, 0, 0])).save(in_dir.path().join("dot.png")).unwrap();
    fs::write(in_dir.path().join("notes.txt"), b"ignored").unwrap();

    let p = Params { formats: vec![ExportFormat::Png], export_contours: false, export_triangulation: false, ..params(in_dir.path(), out_dir.path()) };
    assert_eq!(process(p).unwrap(), 2);
    assert!(out_dir.path().join("a_processed.png").is_file());
    assert!(out_dir.path().join("b_processed.png").is_file());
    assert!(!out_dir.path().join("broken_processed.png").exists());
    assert!(!out_dir.path().join("dot_processed.png").exists());
}

#[test]
fn missing_output_directory_is_an_error() {
    let in_dir = tempfile::tempdir().unwrap();
    let input = in_dir.path().join("scene.png");
    test_image().save(&input).unwrap();
    assert!(process(params(&input, &in_dir.path().join("nowhere"))).is_err());
}

#[test]
fn qoi_export_round_trips() {
    let in_dir = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    let input = in_dir.path().join("scene.png");
    test_image().save(&input).unwrap();
    let p = Params { formats: vec![ExportFormat::Qoi], export_unprocessed: false, ..params(&input, out_dir.path()) };
    process(p).unwrap();
    let back = load_image(&out_dir.path().join("scene_processed.qoi")).unwrap();
    assert_eq!(back.dimensions(), (24, 18));
}

#[test]
fn image_name_stops_at_first_dot() {
    assert_eq!(image_name(Path::new("/tmp/photo.raw.jpg")), "photo");
    assert_eq!(image_name(Path::new("plain.png")), "plain");
}
