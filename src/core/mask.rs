//! Binary foreground masks.

use crate::source::FrameShape;

/// Per-pixel foreground/background classification for one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForegroundMask {
    shape: FrameShape,
    data: Vec<bool>,
}

impl ForegroundMask {
    /// All-background mask.
    pub fn empty(shape: FrameShape) -> Self {
        Self {
            shape,
            data: vec![false; shape.area()],
        }
    }

    /// All-foreground mask.
    pub fn full(shape: FrameShape) -> Self {
        Self {
            shape,
            data: vec![true; shape.area()],
        }
    }

    /// Build a mask by evaluating `f(x, y)` for every pixel.
    pub fn from_fn(shape: FrameShape, mut f: impl FnMut(usize, usize) -> bool) -> Self {
        let mut data = Vec::with_capacity(shape.area());
        for y in 0..shape.height {
            for x in 0..shape.width {
                data.push(f(x, y));
            }
        }
        Self { shape, data }
    }

    pub(crate) fn from_vec(shape: FrameShape, data: Vec<bool>) -> Self {
        debug_assert_eq!(data.len(), shape.area());
        Self { shape, data }
    }

    pub fn shape(&self) -> FrameShape {
        self.shape
    }

    pub fn width(&self) -> usize {
        self.shape.width
    }

    pub fn height(&self) -> usize {
        self.shape.height
    }

    pub fn get(&self, x: usize, y: usize) -> bool {
        self.data[y * self.shape.width + x]
    }

    /// Signed lookup; anything outside the grid is background.
    pub fn get_signed(&self, x: isize, y: isize) -> bool {
        x >= 0
            && y >= 0
            && (x as usize) < self.shape.width
            && (y as usize) < self.shape.height
            && self.get(x as usize, y as usize)
    }

    pub fn set(&mut self, x: usize, y: usize, value: bool) {
        let w = self.shape.width;
        self.data[y * w + x] = value;
    }

    /// Number of foreground pixels.
    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.data
    }
}
