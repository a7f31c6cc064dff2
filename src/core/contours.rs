//! Contour extraction and the scene change metric.
//!
//! Foreground pixels are grouped into 8-connected regions. The outer border
//! of each region is traced into a closed polygon through the pixel centres,
//! and the polygon area is computed with the shoelace formula. Holes inside a
//! region are not traced, so they count towards the region's area and no
//! pixel is ever counted twice. The summed polygon area is an approximation
//! of the foreground pixel count: a one pixel wide line encloses no area.

use crate::core::mask::ForegroundMask;
use serde::{Deserialize, Serialize};

/// Neighbour offsets, clockwise on screen (y grows downwards), starting east.
const DIRECTIONS: [(isize, isize); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];

const WEST: usize = 4;

/// A pixel coordinate on a contour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: isize,
    pub y: isize,
}

impl Point {
    fn step(self, dir: usize) -> Self {
        let (dx, dy) = DIRECTIONS[dir];
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    fn direction_to(self, other: Point) -> usize {
        let delta = (other.x - self.x, other.y - self.y);
        DIRECTIONS
            .iter()
            .position(|&d| d == delta)
            .unwrap_or(WEST)
    }
}

/// Outer border of one connected foreground region.
#[derive(Debug, Clone)]
pub struct Contour {
    points: Vec<Point>,
}

impl Contour {
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Area enclosed by the border polygon.
    pub fn area(&self) -> f64 {
        let n = self.points.len();
        if n < 3 {
            return 0.0;
        }

        let twice: isize = (0..n)
            .map(|i| {
                let a = self.points[i];
                let b = self.points[(i + 1) % n];
                a.x * b.y - b.x * a.y
            })
            .sum();

        twice.abs() as f64 / 2.0
    }

    /// Inclusive bounding box as `(min, max)`.
    pub fn bounding_box(&self) -> (Point, Point) {
        let mut min = self.points[0];
        let mut max = self.points[0];
        for p in &self.points {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }
        (min, max)
    }
}

/// Trace the outer contour of every 8-connected foreground region.
///
/// Regions are found in raster order, so contours come out ordered by their
/// topmost, then leftmost pixel.
pub fn find_contours(mask: &ForegroundMask) -> Vec<Contour> {
    let (w, h) = (mask.width(), mask.height());
    let mut visited = vec![false; w * h];
    let mut contours = Vec::new();

    for y in 0..h {
        for x in 0..w {
            if !mask.get(x, y) || visited[y * w + x] {
                continue;
            }

            mark_region(mask, &mut visited, x, y);
            contours.push(trace_border(
                mask,
                Point {
                    x: x as isize,
                    y: y as isize,
                },
            ));
        }
    }

    contours
}

/// Flood fill the region containing `(x, y)` into `visited`.
fn mark_region(mask: &ForegroundMask, visited: &mut [bool], x: usize, y: usize) {
    let w = mask.width();
    visited[y * w + x] = true;
    let mut to_fill = vec![(x as isize, y as isize)];

    while let Some((x, y)) = to_fill.pop() {
        for &(dx, dy) in &DIRECTIONS {
            let (nx, ny) = (x + dx, y + dy);
            if mask.get_signed(nx, ny) {
                let idx = ny as usize * w + nx as usize;
                if !visited[idx] {
                    visited[idx] = true;
                    to_fill.push((nx, ny));
                }
            }
        }
    }
}

/// Follow the outer border starting at `start`, whose west neighbour is
/// background.
fn trace_border(mask: &ForegroundMask, start: Point) -> Contour {
    let is_set = |p: Point| mask.get_signed(p.x, p.y);

    // First set neighbour clockwise from the west
    let first = (0..8)
        .map(|k| start.step((WEST + k) % 8))
        .find(|&p| is_set(p));

    let Some(first) = first else {
        return Contour {
            points: vec![start],
        };
    };

    let mut points = Vec::new();
    let mut previous = first;
    let mut current = start;

    loop {
        // Counter-clockwise from the pixel we came from
        let back = current.direction_to(previous);
        let next = (1..=8)
            .map(|k| current.step((back + 8 - k) % 8))
            .find(|&p| is_set(p))
            .unwrap_or(previous);

        points.push(current);

        if next == start && current == first {
            break;
        }

        previous = current;
        current = next;
    }

    Contour { points }
}

/// Foreground change of a single frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeMetric {
    /// Summed contour area as a percentage of the frame area, in [0, 100]
    pub percent: f64,
    /// Summed contour area in pixels
    pub area: f64,
    /// Number of foreground regions
    pub regions: usize,
}

/// Compute the change metric of a cleaned mask.
pub fn change_metric(mask: &ForegroundMask, frame_area: usize) -> ChangeMetric {
    if frame_area == 0 {
        return ChangeMetric::default();
    }

    let contours = find_contours(mask);
    let area: f64 = contours.iter().map(Contour::area).sum();

    ChangeMetric {
        percent: (area / frame_area as f64 * 100.0).clamp(0.0, 100.0),
        area,
        regions: contours.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::FrameShape;

    fn rect_mask(shape: FrameShape, xs: std::ops::Range<usize>, ys: std::ops::Range<usize>) -> ForegroundMask {
        ForegroundMask::from_fn(shape, |x, y| xs.contains(&x) && ys.contains(&y))
    }

    #[test]
    fn test_empty_mask_has_no_change() {
        let mask = ForegroundMask::empty(FrameShape::new(10, 10));
        assert!(find_contours(&mask).is_empty());
        assert_eq!(change_metric(&mask, 100), ChangeMetric::default());
    }

    #[test]
    fn test_rectangle_area() {
        let mask = rect_mask(FrameShape::new(20, 20), 2..7, 3..9);
        let contours = find_contours(&mask);

        assert_eq!(contours.len(), 1);
        // Polygon through pixel centres of a 5x6 block
        assert_eq!(contours[0].area(), 20.0);

        let (min, max) = contours[0].bounding_box();
        assert_eq!((min.x, min.y, max.x, max.y), (2, 3, 6, 8));
    }

    #[test]
    fn test_single_pixel_and_line_enclose_nothing() {
        let shape = FrameShape::new(10, 10);
        let mut mask = ForegroundMask::empty(shape);
        mask.set(1, 1, true);
        for x in 4..9 {
            mask.set(x, 6, true);
        }

        let contours = find_contours(&mask);
        assert_eq!(contours.len(), 2);
        assert_eq!(contours[0].points().len(), 1);
        assert!(contours.iter().all(|c| c.area() == 0.0));
    }

    #[test]
    fn test_diagonal_pixels_are_one_region() {
        let shape = FrameShape::new(6, 6);
        let mut mask = ForegroundMask::empty(shape);
        mask.set(1, 1, true);
        mask.set(2, 2, true);
        mask.set(3, 3, true);

        assert_eq!(find_contours(&mask).len(), 1);
    }

    #[test]
    fn test_hole_is_not_counted_twice() {
        let shape = FrameShape::new(20, 20);
        let mask = ForegroundMask::from_fn(shape, |x, y| {
            let outer = (2..12).contains(&x) && (2..12).contains(&y);
            let hole = (5..9).contains(&x) && (5..9).contains(&y);
            outer && !hole
        });

        let contours = find_contours(&mask);
        assert_eq!(contours.len(), 1);
        assert_eq!(contours[0].area(), 81.0);
    }

    #[test]
    fn test_concave_region() {
        // An L shape: 6x2 bar on top of a 2x4 leg
        let shape = FrameShape::new(12, 12);
        let mask = ForegroundMask::from_fn(shape, |x, y| {
            ((1..7).contains(&x) && (1..3).contains(&y)) || ((1..3).contains(&x) && (3..7).contains(&y))
        });

        let contours = find_contours(&mask);
        assert_eq!(contours.len(), 1);
        // The inner corner pixel (2,2) has no background 4-neighbour, so the
        // border cuts diagonally from (3,2) to (2,3) and gains half a pixel
        assert_eq!(contours[0].area(), 9.5);
    }

    #[test]
    fn test_metric_sums_disjoint_regions() {
        let shape = FrameShape::new(20, 10);
        let mask = ForegroundMask::from_fn(shape, |x, y| {
            ((1..4).contains(&x) && (1..4).contains(&y)) || ((10..15).contains(&x) && (2..7).contains(&y))
        });

        let metric = change_metric(&mask, shape.area());
        assert_eq!(metric.regions, 2);
        assert_eq!(metric.area, 4.0 + 16.0);
        assert!((metric.percent - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_full_frame_metric_is_bounded() {
        let shape = FrameShape::new(10, 10);
        let metric = change_metric(&ForegroundMask::full(shape), shape.area());
        assert_eq!(metric.area, 81.0);
        assert!(metric.percent <= 100.0);
    }
}
