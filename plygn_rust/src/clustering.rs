use image::RgbImage;
use log::debug;
use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use std::thread;

/// Labels are stored as bytes, which bounds the cluster count.
pub const MAX_CLUSTERS: usize = 256;

const COLOR_DOMAIN: usize = 1 << 24;

/// One distinct color of the input image and how many pixels carry it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UniqueColor {
    pub color: [u8; 3],
    pub frequency: u64,
}

impl UniqueColor {
    #[inline]
    pub fn key(&self) -> u32 {
        pack(self.color)
    }
}

#[inline]
fn pack(c: [u8; 3]) -> u32 {
    (c[0] as u32) << 16 | (c[1] as u32) << 8 | c[2] as u32
}

#[inline]
fn unpack(k: u32) -> [u8; 3] {
    [(k >> 16) as u8, (k >> 8) as u8, k as u8]
}

/// Distinct colors with their pixel counts, ordered by packed RGB value.
pub fn dedupe_colors(image: &RgbImage) -> Vec<UniqueColor> {
    let mut keys: Vec<u32> = image.pixels().map(|p| pack(p.0)).collect();
    keys.sort_unstable();
    let mut out: Vec<UniqueColor> = Vec::new();
    for k in keys {
        match out.last_mut() {
            Some(last) if last.key() == k => last.frequency += 1,
            _ => out.push(UniqueColor { color: unpack(k), frequency: 1 }),
        }
    }
    out
}

/// Per-pixel cluster assignment, row-major, same shape as the source image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelImage {
    width: u32,
    height: u32,
    labels: Vec<u8>,
}

impl LabelImage {
    /// `None` when the buffer length does not match `width * height`.
    pub fn from_raw(width: u32, height: u32, labels: Vec<u8>) -> Option<Self> {
        (labels.len() == width as usize * height as usize).then_some(Self { width, height, labels })
    }

    pub fn width(&self) -> u32 { self.width }
    pub fn height(&self) -> u32 { self.height }
    pub fn as_slice(&self) -> &[u8] { &self.labels }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.labels[y as usize * self.width as usize + x as usize]
    }

    /// Number of pixels carrying each label in `0..clusters`.
    pub fn counts(&self, clusters: usize) -> Vec<usize> {
        let mut counts = vec![0usize; clusters];
        for &l in &self.labels {
            if let Some(c) = counts.get_mut(l as usize) { *c += 1; }
        }
        counts
    }
}

#[derive(Clone, Copy, Debug)]
pub struct KmeansParams {
    pub clusters: usize,
    pub max_iterations: usize,
    pub runs: usize,
    pub seed: u64,
    pub num_threads: usize,
}

/// Result of the best k-means restart.
#[derive(Clone, Debug, Default)]
pub struct Clustering {
    pub centroids: Vec<[f64; 3]>,
    /// One label per input point.
    pub labels: Vec<u8>,
    /// Weighted sum of squared distances to the assigned centroid.
    pub inertia: f64,
    pub iterations: usize,
    pub run: usize,
}

#[inline]
fn dist_sq(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    let (d0, d1, d2) = (a[0] - b[0], a[1] - b[1], a[2] - b[2]);
    d0 * d0 + d1 * d1 + d2 * d2
}

// Strict comparison keeps the lowest centroid index on ties.
#[inline]
fn nearest(p: &[f64; 3], centroids: &[[f64; 3]]) -> (usize, f64) {
    let mut best = 0usize;
    let mut bestd = f64::INFINITY;
    for (i, c) in centroids.iter().enumerate() {
        let d = dist_sq(p, c);
        if d < bestd {
            bestd = d;
            best = i;
        }
    }
    (best, bestd)
}

fn pick_weighted(rng: &mut Pcg32, weights: &[f64], total: f64) -> usize {
    let mut target = rng.gen::<f64>() * total;
    for (i, w) in weights.iter().enumerate() {
        if *w <= 0.0 { continue; }
        if target < *w { return i; }
        target -= w;
    }
    // rounding left a sliver of mass at the end
    weights.iter().rposition(|w| *w > 0.0).unwrap_or(0)
}

// Weighted k-means++: every further seed is drawn with probability weight * D².
fn seed_centroids(points: &[[f64; 3]], weights: &[f64], k: usize, rng: &mut Pcg32) -> Vec<[f64; 3]> {
    let total: f64 = weights.iter().sum();
    let mut centroids = Vec::with_capacity(k);
    centroids.push(points[pick_weighted(rng, weights, total)]);
    let mut closest: Vec<f64> = points.iter().map(|p| dist_sq(p, &centroids[0])).collect();
    while centroids.len() < k {
        let scores: Vec<f64> = closest.iter().zip(weights).map(|(d, w)| d * w).collect();
        let mass: f64 = scores.iter().sum();
        let next = if mass > 0.0 {
            points[pick_weighted(rng, &scores, mass)]
        } else {
            // every point already coincides with a centroid
            points[pick_weighted(rng, weights, total)]
        };
        for (d, p) in closest.iter_mut().zip(points) {
            *d = d.min(dist_sq(p, &next));
        }
        centroids.push(next);
    }
    centroids
}

fn assign(points: &[[f64; 3]], weights: &[f64], centroids: &[[f64; 3]], labels: &mut [u8]) -> (bool, f64) {
    let mut changed = false;
    let mut inertia = 0.0;
    for ((p, w), l) in points.iter().zip(weights).zip(labels.iter_mut()) {
        let (best, d) = nearest(p, centroids);
        if *l as usize != best {
            *l = best as u8;
            changed = true;
        }
        inertia += w * d;
    }
    (changed, inertia)
}

fn update(points: &[[f64; 3]], weights: &[f64], labels: &[u8], centroids: &mut [[f64; 3]]) {
    let mut sums = vec![[0.0f64; 4]; centroids.len()];
    for ((p, w), l) in points.iter().zip(weights).zip(labels) {
        let s = &mut sums[*l as usize];
        s[0] += p[0] * w; s[1] += p[1] * w; s[2] += p[2] * w; s[3] += w;
    }
    for (c, s) in centroids.iter_mut().zip(sums) {
        // empty clusters keep their previous position
        if s[3] > 0.0 { *c = [s[0] / s[3], s[1] / s[3], s[2] / s[3]]; }
    }
}

fn run_once(points: &[[f64; 3]], weights: &[f64], k: usize, max_iterations: usize, seed: u64, run: usize) -> Clustering {
    let mut rng = Pcg32::seed_from_u64(seed.wrapping_add(run as u64));
    let mut centroids = seed_centroids(points, weights, k, &mut rng);
    let mut labels = vec![0u8; points.len()];
    let (_, mut inertia) = assign(points, weights, &centroids, &mut labels);
    let mut iterations = 0usize;
    while iterations < max_iterations {
        iterations += 1;
        update(points, weights, &labels, &mut centroids);
        let (changed, next_inertia) = assign(points, weights, &centroids, &mut labels);
        inertia = next_inertia;
        if !changed { break; }
    }
    Clustering { centroids, labels, inertia, iterations, run }
}

// Shared restart counter, handed out to workers one index at a time.
struct RunQueue {
    next: Mutex<usize>,
    total: usize,
}

impl RunQueue {
    fn new(total: usize) -> Self { Self { next: Mutex::new(0), total } }
    fn next(&self) -> Option<usize> {
        let mut guard = self.next.lock();
        if *guard >= self.total { return None; }
        let idx = *guard; *guard += 1;
        Some(idx)
    }
}

fn better(candidate: &Clustering, current: &Clustering) -> bool {
    candidate.inertia < current.inertia || (candidate.inertia == current.inertia && candidate.run < current.run)
}

/// Weighted k-means over `points`, restarted `params.runs` times; the restart with
/// the lowest inertia wins, ties going to the lowest restart index.
pub fn weighted_kmeans(points: &[[f64; 3]], weights: &[f64], params: &KmeansParams) -> Clustering {
    assert_eq!(points.len(), weights.len(), "every point needs a weight");
    if points.is_empty() || params.clusters == 0 {
        return Clustering::default();
    }
    let k = params.clusters.min(MAX_CLUSTERS);
    let runs = params.runs.max(1);
    let workers = params.num_threads.clamp(1, runs);
    let queue = RunQueue::new(runs);
    let best: Mutex<Option<Clustering>> = Mutex::new(None);

    thread::scope(|s| {
        for _ in 0..workers {
            s.spawn(|| {
                while let Some(run) = queue.next() {
                    let result = run_once(points, weights, k, params.max_iterations, params.seed, run);
                    debug!("k-means run {}: inertia={:.3} iterations={}", run, result.inertia, result.iterations);
                    let mut slot = best.lock();
                    let replace = match slot.as_ref() {
                        Some(current) => better(&result, current),
                        None => true,
                    };
                    if replace { *slot = Some(result); }
                }
            });
        }
    });

    best.into_inner().unwrap_or_default()
}

/// Resolve every pixel's label through a direct-indexed table over the full 24-bit color domain.
pub fn expand_labels(image: &RgbImage, unique: &[UniqueColor], labels: &[u8], num_threads: usize) -> LabelImage {
    let (w, h) = image.dimensions();
    let mut lookup = vec![0u8; COLOR_DOMAIN];
    for (u, l) in unique.iter().zip(labels) {
        lookup[u.key() as usize] = *l;
    }

    let row_len = w as usize;
    let mut out = vec![0u8; row_len * h as usize];
    if out.is_empty() {
        return LabelImage { width: w, height: h, labels: out };
    }
    let raw = image.as_raw();
    let rows_per_band = (h as usize).div_ceil(num_threads.max(1)).max(1);
    let lookup = &lookup;
    thread::scope(|s| {
        for (band, chunk) in out.chunks_mut(rows_per_band * row_len).enumerate() {
            let start = band * rows_per_band * row_len * 3;
            let src = &raw[start..start + chunk.len() * 3];
            s.spawn(move || {
                for (dst, px) in chunk.iter_mut().zip(src.chunks_exact(3)) {
                    *dst = lookup[pack([px[0], px[1], px[2]]) as usize];
                }
            });
        }
    });
    LabelImage { width: w, height: h, labels: out }
}
