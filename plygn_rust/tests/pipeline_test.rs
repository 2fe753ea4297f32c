use image::{DynamicImage, ImageBuffer, Rgb, RgbImage};
use plygn_rust::subdivision::split_depth;
use plygn_rust::{
    default_config, find_triangulation, low_poly, low_poly_with_progress, process_dynamic, split_triangulation, BarycentricBasis, BorderKind, ColorSpace, Config,
    Stage, StageReport, Triangle,
};

fn config(clusters: usize) -> Config {
    Config { clusters, kmeans_runs: 3, num_threads: 2, ..default_config() }
}

// Four flat quadrants with a diagonal gradient stripe through them.
fn blocks(w: u32, h: u32) -> RgbImage {
    ImageBuffer::from_fn(w, h, |x, y| {
        if x.abs_diff(y) < 3 {
            return Rgb([(x * 5 % 256) as u8, 90, (y * 7 % 256) as u8]);
        }
        match (x < w / 2, y < h / 2) {
            (true, true) => Rgb([220, 30, 30]),
            (false, true) => Rgb([30, 200, 40]),
            (true, false) => Rgb([20, 40, 210]),
            (false, false) => Rgb([240, 240, 60]),
        }
    })
}

fn assert_covered(w: u32, h: u32, triangles: &[Triangle]) {
    let bases: Vec<BarycentricBasis> = triangles.iter().map(BarycentricBasis::new).collect();
    for y in 0..h as i32 {
        for x in 0..w as i32 {
            assert!(bases.iter().any(|b| b.contains(x, y)), "pixel ({x}, {y}) is not covered");
        }
    }
}

#[test]
fn solid_gray_is_reproduced_exactly() {
    let img: RgbImage = ImageBuffer::from_fn(100, 100, |_, _| Rgb([128, 128, 128]));
    let cfg = Config { vertex_distance: 10, split_threshold: -1, variance_threshold: -1.0, ..config(1) };
    let out = low_poly(&img, &cfg).expect("pipeline should succeed");

    assert!(out.labels.as_slice().iter().all(|&l| l == 0));
    assert_eq!(out.contours.len(), 1);
    assert_eq!(out.contours[0].contours.len(), 1);
    assert!((30..=45).contains(&out.vertices.len()), "got {} vertices", out.vertices.len());
    assert_eq!(out.canvas, img);
    assert_eq!(out.stats.unfilled(), 0);
}

#[test]
fn edge_touching_regions_get_outer_contours() {
    let img: RgbImage = ImageBuffer::from_fn(40, 20, |x, _| if x < 20 { Rgb([200, 30, 30]) } else { Rgb([30, 30, 200]) });
    let out = low_poly(&img, &config(2)).unwrap();
    assert_eq!(out.contours.len(), 2);
    for group in &out.contours {
        assert_eq!(group.contours.len(), 1, "label {}", group.label);
        assert_eq!(group.contours[0].kind, BorderKind::Outer);
        assert_eq!(group.contours[0].len(), 2 * (20 + 20) - 4);
    }
    assert!(out.vertices.len() >= 6);
    assert!(out.triangles.len() > 2);
}

#[test]
fn every_pixel_is_covered_by_the_mesh() {
    let img = blocks(40, 30);
    let out = low_poly(&img, &config(4)).unwrap();
    assert_covered(40, 30, &out.triangles);
}

#[test]
fn split_mesh_still_covers_the_canvas() {
    // power-of-two spans keep every midpoint exact
    let mesh = find_triangulation(17, 17, &[]).unwrap();
    let split = split_triangulation(&mesh, 8);
    assert_eq!(split.len(), 2 * 16);
    assert!(split.iter().all(|t| t.area() <= 8.0));
    assert_covered(17, 17, &split);
}

#[test]
fn labels_partition_the_image() {
    let img = blocks(32, 24);
    let k = 5;
    let out = low_poly(&img, &config(k)).unwrap();
    assert!(out.labels.as_slice().iter().all(|&l| (l as usize) < k));
    assert_eq!(out.labels.counts(k).iter().sum::<usize>(), 32 * 24);
    assert_eq!(out.contours.len(), k);
}

#[test]
fn thread_count_does_not_change_the_result() {
    let img = blocks(48, 36);
    let one = low_poly(&img, &Config { num_threads: 1, ..config(4) }).unwrap();
    let many = low_poly(&img, &Config { num_threads: 7, ..config(4) }).unwrap();
    assert_eq!(one.labels, many.labels);
    assert_eq!(one.triangles, many.triangles);
    assert_eq!(one.canvas, many.canvas);
}

#[test]
fn hsv_space_runs_end_to_end() {
    let img = blocks(30, 30);
    let out = low_poly(&img, &Config { color_space: ColorSpace::Hsv, ..config(3) }).unwrap();
    assert_eq!(out.canvas.dimensions(), (30, 30));
}

#[test]
fn variance_gate_only_adds_unfilled_triangles() {
    let img = blocks(40, 40);
    let base = low_poly(&img, &config(4)).unwrap();
    for v in [1.0, 20.0, 80.0, 500.0] {
        let gated = low_poly(&img, &Config { variance_threshold: v, ..config(4) }).unwrap();
        assert_eq!(gated.triangles, base.triangles);
        assert!(gated.stats.unfilled() >= base.stats.unfilled(), "variance {v}");
    }
}

#[test]
fn splitting_bounds_triangle_area() {
    let img = blocks(40, 40);
    let coarse = low_poly(&img, &config(4)).unwrap();
    let fine = low_poly(&img, &Config { split_threshold: 20, ..config(4) }).unwrap();
    assert!(fine.triangles.len() > coarse.triangles.len());
    assert_eq!(fine.triangles, split_triangulation(&coarse.triangles, 20));
    let expected: usize = coarse.triangles.iter().map(|t| 4usize.pow(split_depth(t, 20))).sum();
    assert_eq!(fine.triangles.len(), expected);
}

#[test]
fn progress_reports_every_stage_in_order() {
    let img = blocks(20, 20);
    let mut seen = Vec::new();
    low_poly_with_progress(&img, &config(3), &mut |r: &StageReport| seen.push((r.step, r.stage))).unwrap();
    let stages: Vec<Stage> = seen.iter().map(|s| s.1).collect();
    assert_eq!(
        stages,
        vec![Stage::ColorSpaceTransformation, Stage::ColorClustering, Stage::Contouring, Stage::VertexSearch, Stage::Triangulation, Stage::TriangleColorization]
    );

    seen.clear();
    low_poly_with_progress(&img, &Config { split_threshold: 10, ..config(3) }, &mut |r: &StageReport| seen.push((r.step, r.stage))).unwrap();
    assert_eq!(seen.len(), 7);
    assert_eq!(seen[5], (6, Stage::TriangleSplitting));
    assert_eq!(Stage::TriangleSplitting.to_string(), "Triangle Splitting");
}

#[test]
fn invalid_configuration_is_rejected() {
    let img = blocks(10, 10);
    let bad = [
        Config { clusters: 0, ..config(1) },
        Config { clusters: 257, ..config(1) },
        Config { vertex_distance: 0, ..config(1) },
        Config { variance_threshold: f64::NAN, ..config(1) },
        Config { num_threads: 0, ..config(1) },
        Config { kmeans_runs: 0, ..config(1) },
        Config { kmeans_iterations: 0, ..config(1) },
    ];
    for cfg in bad {
        assert!(low_poly(&img, &cfg).is_err(), "{:?} should be rejected", cfg);
    }
    assert!(config(256).validate().is_ok());
}

#[test]
fn tiny_images_are_rejected() {
    let line: RgbImage = ImageBuffer::from_fn(5, 1, |_, _| Rgb([1, 2, 3]));
    let err = low_poly(&line, &config(1)).unwrap_err();
    assert!(err.to_string().contains("2x2"));
    let smallest: RgbImage = ImageBuffer::from_fn(2, 2, |x, _| Rgb([x as u8 * 200, 0, 0]));
    assert!(low_poly(&smallest, &config(2)).is_ok());
}

#[test]
fn process_dynamic_keeps_dimensions() {
    let buf: RgbImage = ImageBuffer::from_fn(13, 9, |x, y| Rgb([(x * 19) as u8, (y * 23) as u8, 80]));
    let out = process_dynamic(&DynamicImage::ImageRgb8(buf), config(3)).expect("process_dynamic should succeed");
    assert_eq!(out.dimensions(), (13, 9));
}
