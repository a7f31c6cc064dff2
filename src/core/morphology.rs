//! Morphological opening for foreground masks.
//!
//! Opening is an erosion followed by a dilation with the same structuring
//! element. It removes specks smaller than the element and leaves larger
//! blobs roughly intact. Pixels outside the mask never erode a neighbour and
//! never dilate into one, so a fully set mask survives unchanged.

use crate::core::mask::ForegroundMask;
use serde::{Deserialize, Serialize};

/// Shape of the structuring element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KernelShape {
    #[default]
    Ellipse,
    Rect,
}

/// A binary structuring element with its anchor at the centre.
#[derive(Debug, Clone)]
pub struct StructuringElement {
    size: usize,
    /// Offsets `(dx, dy)` of the set cells relative to the anchor
    offsets: Vec<(isize, isize)>,
}

impl StructuringElement {
    /// Build a `size` x `size` element. Sizes below 1 are treated as 1.
    pub fn new(shape: KernelShape, size: usize) -> Self {
        let size = size.max(1);
        let anchor = (size / 2) as isize;
        let mut offsets = Vec::new();

        match shape {
            KernelShape::Rect => {
                for row in 0..size as isize {
                    for col in 0..size as isize {
                        offsets.push((col - anchor, row - anchor));
                    }
                }
            }
            KernelShape::Ellipse => {
                // Row spans of an ellipse inscribed in the square, anchored
                // at the centre cell
                let radius = (size / 2) as f64;
                for row in 0..size as isize {
                    let dy = (row - anchor) as f64;
                    if dy.abs() > radius {
                        continue;
                    }
                    let dx = if radius > 0.0 {
                        (radius * (1.0 - dy * dy / (radius * radius)).max(0.0).sqrt()).round()
                            as isize
                    } else {
                        0
                    };
                    let first = (anchor - dx).max(0);
                    let last = (anchor + dx + 1).min(size as isize);
                    for col in first..last {
                        offsets.push((col - anchor, row - anchor));
                    }
                }
            }
        }

        Self { size, offsets }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of set cells.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

/// Stateless mask cleaner.
#[derive(Debug, Clone)]
pub struct MorphologicalCleaner {
    element: StructuringElement,
}

impl MorphologicalCleaner {
    pub fn new(shape: KernelShape, size: usize) -> Self {
        Self {
            element: StructuringElement::new(shape, size),
        }
    }

    pub fn element(&self) -> &StructuringElement {
        &self.element
    }

    /// Open the mask: erode, then dilate.
    pub fn clean(&self, mask: &ForegroundMask) -> ForegroundMask {
        dilate(&erode(mask, &self.element), &self.element)
    }
}

/// A pixel survives erosion only if every covered pixel is set. Cells that
/// fall outside the mask do not count against it.
pub fn erode(mask: &ForegroundMask, element: &StructuringElement) -> ForegroundMask {
    let (w, h) = (mask.width() as isize, mask.height() as isize);
    ForegroundMask::from_fn(mask.shape(), |x, y| {
        element.offsets.iter().all(|&(dx, dy)| {
            let (sx, sy) = (x as isize + dx, y as isize + dy);
            sx < 0 || sy < 0 || sx >= w || sy >= h || mask.get(sx as usize, sy as usize)
        })
    })
}

/// A pixel is set after dilation if the element, anchored on any set pixel,
/// covers it. The element is reflected relative to erosion so that opening
/// never grows the mask, even for even-sized elements.
pub fn dilate(mask: &ForegroundMask, element: &StructuringElement) -> ForegroundMask {
    ForegroundMask::from_fn(mask.shape(), |x, y| {
        element
            .offsets
            .iter()
            .any(|&(dx, dy)| mask.get_signed(x as isize - dx, y as isize - dy))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::FrameShape;

    fn cells(element: &StructuringElement) -> Vec<Vec<bool>> {
        let anchor = (element.size / 2) as isize;
        let mut grid = vec![vec![false; element.size]; element.size];
        for &(dx, dy) in &element.offsets {
            grid[(dy + anchor) as usize][(dx + anchor) as usize] = true;
        }
        grid
    }

    #[test]
    fn test_default_ellipse_layout() {
        let element = StructuringElement::new(KernelShape::Ellipse, 4);
        let grid = cells(&element);

        assert_eq!(grid[0], vec![false, false, true, false]);
        assert_eq!(grid[1], vec![true; 4]);
        assert_eq!(grid[2], vec![true; 4]);
        assert_eq!(grid[3], vec![true; 4]);
        assert_eq!(element.len(), 13);
    }

    #[test]
    fn test_rect_layout() {
        let element = StructuringElement::new(KernelShape::Rect, 3);
        assert_eq!(element.len(), 9);
    }

    #[test]
    fn test_empty_mask_is_fixed_point() {
        let cleaner = MorphologicalCleaner::new(KernelShape::Ellipse, 4);
        let mask = ForegroundMask::empty(FrameShape::new(20, 15));
        assert_eq!(cleaner.clean(&mask), mask);
    }

    #[test]
    fn test_full_mask_is_fixed_point() {
        let cleaner = MorphologicalCleaner::new(KernelShape::Ellipse, 4);
        let mask = ForegroundMask::full(FrameShape::new(20, 15));
        assert_eq!(cleaner.clean(&mask), mask);
    }

    #[test]
    fn test_removes_isolated_specks() {
        let cleaner = MorphologicalCleaner::new(KernelShape::Ellipse, 4);
        let mut mask = ForegroundMask::empty(FrameShape::new(20, 20));
        mask.set(3, 3, true);
        mask.set(10, 12, true);
        mask.set(11, 12, true);

        assert_eq!(cleaner.clean(&mask).count(), 0);
    }

    #[test]
    fn test_keeps_large_blob() {
        let cleaner = MorphologicalCleaner::new(KernelShape::Rect, 3);
        let shape = FrameShape::new(30, 30);
        let mask = ForegroundMask::from_fn(shape, |x, y| (5..15).contains(&x) && (5..15).contains(&y));

        // A square is open with respect to a smaller square
        assert_eq!(cleaner.clean(&mask), mask);
    }

    #[test]
    fn test_blob_with_speck_loses_only_speck() {
        let cleaner = MorphologicalCleaner::new(KernelShape::Rect, 3);
        let shape = FrameShape::new(30, 30);
        let blob = ForegroundMask::from_fn(shape, |x, y| (5..15).contains(&x) && (5..15).contains(&y));
        let mut noisy = blob.clone();
        noisy.set(25, 25, true);

        assert_eq!(cleaner.clean(&noisy), blob);
    }
}
