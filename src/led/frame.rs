//! Frame buffer for the light strip
//!
//! One buffer per engine, mutated only by the render thread that owns
//! it, and handed to the strip device as a whole frame.

use super::color::{Rgb, BLACK};

/// Ordered pixel buffer, flushed to hardware as one atomic write
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    pixels: Vec<Rgb>,
}

impl FrameBuffer {
    /// Create an all-black buffer of `len` pixels
    pub fn new(len: usize) -> Self {
        Self {
            pixels: vec![BLACK; len],
        }
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Set one pixel; indexes past the strip are ignored
    pub fn set(&mut self, index: usize, color: Rgb) {
        if let Some(px) = self.pixels.get_mut(index) {
            *px = color;
        }
    }

    /// Fill every pixel with one color
    pub fn fill(&mut self, color: Rgb) {
        self.pixels.fill(color);
    }

    /// Blank the whole buffer
    pub fn clear(&mut self) {
        self.fill(BLACK);
    }

    /// The frame as pixel data for [`super::strip::StripDevice::show`]
    pub fn pixels(&self) -> &[Rgb] {
        &self.pixels
    }
}
