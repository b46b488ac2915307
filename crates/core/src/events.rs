//! Viewer event sink
//!
//! One [`ViewerEvents`] instance is handed to the viewer at construction and
//! receives every notification. Tile deliveries arrive on the render worker
//! thread; everything else is reported from the thread driving the viewer.

use std::sync::Arc;

use stripview_render::{PageRenderingError, PixelBuffer, Tile};

use crate::error::ViewerError;

/// Receives viewer notifications. Every method defaults to doing nothing.
pub trait ViewerEvents: Send + Sync {
    /// The document opened with `page_count` display pages.
    fn on_load_complete(&self, _page_count: u32) {}

    /// Opening failed for a reason other than a missing password.
    fn on_load_error(&self, _error: &ViewerError) {}

    /// The document is encrypted; load again with a password.
    fn on_password_required(&self) {}

    fn on_page_changed(&self, _page: u32, _page_count: u32) {}

    /// The viewport moved. `position` is in `[0, 1]`.
    fn on_page_scrolled(&self, _page: u32, _position: f32) {}

    /// A page could not be opened and will stay blank.
    fn on_page_error(&self, _error: &PageRenderingError) {}

    /// The first tile of the session arrived.
    fn on_initially_rendered(&self, _page_count: u32) {}

    /// Cached content changed and the viewport should be drawn again.
    ///
    /// Called on the render worker thread.
    fn on_redraw_requested(&self) {}

    /// Every page has a printing thumbnail.
    fn on_bitmaps_ready(&self, _thumbnails: Vec<Arc<Tile<PixelBuffer>>>) {}
}

/// Event sink that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEvents;

impl ViewerEvents for NoopEvents {}
