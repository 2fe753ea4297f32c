use crate::contouring::ContourGroup;
use crate::geometry::Point;

/// Pick roughly every `preferred_distance`-th point along a closed contour.
///
/// Contours shorter than three preferred steps fall back to a spacing that still
/// yields three vertices. The leftover positions after the last step are spread
/// over all steps, so the gap between the last and the first vertex does not grow
/// to almost twice the spacing.
pub fn sample_contour(points: &[Point], preferred_distance: usize) -> Vec<Point> {
    let length = points.len();
    if length < 3 {
        return Vec::new();
    }

    let mut distance = preferred_distance.max(1);
    if length < 3 * distance {
        distance = (length / 3).max(1);
    }

    let vertex_count = length / distance;
    let remaining = length - vertex_count * distance;
    distance += remaining / vertex_count;

    (1..=vertex_count).map(|i| points[i * distance - 1]).collect()
}

/// Flat vertex list over every contour of every group, in traversal order.
pub fn find_vertices(groups: &[ContourGroup], preferred_distance: usize) -> Vec<Point> {
    let mut vertices = Vec::new();
    for group in groups {
        for contour in &group.contours {
            vertices.extend(sample_contour(&contour.points, preferred_distance));
        }
    }
    vertices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contouring::{BorderKind, Contour};

    fn line(n: usize) -> Vec<Point> {
        (0..n as i32).map(|i| Point::new(i, 0)).collect()
    }

    #[test]
    fn too_short_contours_are_dropped() {
        assert!(sample_contour(&line(0), 5).is_empty());
        assert!(sample_contour(&line(2), 1).is_empty());
    }

    #[test]
    fn short_contour_still_gets_three_vertices() {
        let v = sample_contour(&line(7), 10);
        // distance falls back to 7 / 3 = 2, count 3, remainder 1 shared as 0
        assert_eq!(v, vec![Point::new(1, 0), Point::new(3, 0), Point::new(5, 0)]);
    }

    #[test]
    fn remainder_is_spread_over_steps() {
        // 47 points, distance 10: 4 vertices, remainder 7, spacing becomes 11
        let v = sample_contour(&line(47), 10);
        let xs: Vec<i32> = v.iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![10, 21, 32, 43]);
    }

    #[test]
    fn exact_multiple_keeps_spacing() {
        let v = sample_contour(&line(40), 10);
        let xs: Vec<i32> = v.iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![9, 19, 29, 39]);
    }

    #[test]
    fn never_indexes_past_the_end() {
        for n in 3..200 {
            for d in 1..25 {
                let v = sample_contour(&line(n), d);
                assert!(v.len() >= 3 || n < 3, "n={n} d={d}");
            }
        }
    }

    #[test]
    fn groups_are_flattened_in_order() {
        let contour = |offset: i32| Contour {
            points: (0..9).map(|i| Point::new(i + offset, 0)).collect(),
            kind: BorderKind::Outer,
            parent: None,
        };
        let groups = vec![
            ContourGroup { label: 0, contours: vec![contour(0)] },
            ContourGroup { label: 1, contours: vec![contour(100), contour(200)] },
        ];
        let v = find_vertices(&groups, 3);
        assert_eq!(v.len(), 9);
        assert_eq!(v[0], Point::new(2, 0));
        assert_eq!(v[3], Point::new(102, 0));
        assert_eq!(v[8], Point::new(208, 0));
    }
}
