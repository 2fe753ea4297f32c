use crate::geometry::Triangle;

// 4^MAX_DEPTH children already exceed any canvas the pipeline can hold.
const MAX_DEPTH: u32 = 24;

/// Number of 1-to-4 splits needed so a child's area drops to `threshold`:
/// `ceil(log4(area / threshold))`, never negative.
///
/// Evaluated on the doubled integer area, so the comparison `area <= threshold * 4^d`
/// is exact instead of going through a floating-point logarithm.
pub fn split_depth(t: &Triangle, threshold: i64) -> u32 {
    if threshold <= 0 {
        return 0;
    }
    let area2 = t.doubled_area() as u128;
    let mut limit = 2 * threshold as u128;
    let mut depth = 0;
    while area2 > limit && depth < MAX_DEPTH {
        limit *= 4;
        depth += 1;
    }
    depth
}

/// Split at the three edge midpoints into three corner triangles plus the center one.
pub fn split_triangle(t: &Triangle) -> [Triangle; 4] {
    let (v1, v2, v3) = (t.a, t.b, t.c);
    let m12 = v1.midpoint(v2);
    let m23 = v2.midpoint(v3);
    let m31 = v3.midpoint(v1);
    [
        Triangle::new(v1, m12, m31),
        Triangle::new(m12, v2, m23),
        Triangle::new(m31, m23, v3),
        Triangle::new(m12, m23, m31),
    ]
}

/// Split `t` exactly `depth` times, appending the `4^depth` leaves to `out`.
/// Leaves come out depth-first in child order, matching a recursive split.
pub fn split_recursive(t: Triangle, depth: u32, out: &mut Vec<Triangle>) {
    let mut stack: Vec<(Triangle, u32)> = vec![(t, depth)];
    while let Some((current, remaining)) = stack.pop() {
        if remaining == 0 {
            out.push(current);
            continue;
        }
        // reversed so the first child is popped first
        for child in split_triangle(&current).into_iter().rev() {
            stack.push((child, remaining - 1));
        }
    }
}

/// Refine a triangulation until no triangle is larger than `threshold`
/// (up to the granularity of midpoint splitting). A non-positive threshold
/// returns the input unchanged.
pub fn split_triangulation(triangles: &[Triangle], threshold: i64) -> Vec<Triangle> {
    if threshold <= 0 {
        return triangles.to_vec();
    }
    let depths: Vec<u32> = triangles.iter().map(|t| split_depth(t, threshold)).collect();
    let count: usize = depths.iter().map(|&d| 4usize.pow(d)).sum();
    let mut out = Vec::with_capacity(count);
    for (t, &d) in triangles.iter().zip(&depths) {
        split_recursive(*t, d, &mut out);
    }
    debug_assert_eq!(out.len(), count);
    out
}
