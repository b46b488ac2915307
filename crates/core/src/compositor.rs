//! Drawing contract
//!
//! The viewer does not draw. It walks the cache and tells a [`Compositor`]
//! where each tile goes in viewport coordinates.

use stripview_render::{PixelBuffer, Tile};

/// Destination of a tile in viewport pixels. Edges are whole pixels so
/// neighbouring tiles share an edge without seams.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DestRect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl DestRect {
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    /// Whether any part of the rectangle lies inside a `width` x `height` viewport.
    pub fn intersects_viewport(&self, width: f32, height: f32) -> bool {
        self.left < width && self.right > 0.0 && self.top < height && self.bottom > 0.0
    }
}

/// Draws tiles scaled into their destination rectangle.
pub trait Compositor {
    fn draw_tile(&mut self, tile: &Tile<PixelBuffer>, destination: DestRect);
}
