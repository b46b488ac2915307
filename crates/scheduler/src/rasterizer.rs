//! Per-task rasterization
//!
//! Turns a [`RenderingTask`] into a [`Tile`]: opens the page once, allocates
//! the pixel buffer, maps the relative bounds to device pixels and asks the
//! document to rasterize.

use std::collections::HashMap;
use std::sync::Arc;

use stripview_render::{
    DeviceRect, Document, PageOrder, PageRenderingError, PixelBuffer, RelativeBounds, Tile,
};

use crate::task::RenderingTask;

/// Device placement of the whole page so that the `bounds` fragment lands on
/// a `width` x `height` buffer.
///
/// The buffer rectangle is translated by the fragment's top-left corner and
/// scaled by the inverse of its size, then rounded to whole pixels.
pub fn device_bounds(width: u32, height: u32, bounds: RelativeBounds) -> DeviceRect {
    let w = width as f32;
    let h = height as f32;
    let scale_x = 1.0 / bounds.width();
    let scale_y = 1.0 / bounds.height();
    let dx = -bounds.left * w;
    let dy = -bounds.top * h;

    DeviceRect {
        left: round(dx * scale_x),
        top: round(dy * scale_y),
        right: round((w + dx) * scale_x),
        bottom: round((h + dy) * scale_y),
    }
}

// Half-up, matching how the pixel size is rounded.
fn round(value: f32) -> i32 {
    (value + 0.5).floor() as i32
}

/// Renders tasks for one document. Owned by the render worker.
pub struct TileRasterizer {
    document: Arc<dyn Document>,
    pages: PageOrder,
    /// Open outcome per document page.
    opened: HashMap<u32, bool>,
}

impl TileRasterizer {
    pub fn new(document: Arc<dyn Document>, pages: PageOrder) -> Self {
        Self {
            document,
            pages,
            opened: HashMap::new(),
        }
    }

    /// Whether the page has failed to open before.
    pub fn has_failed(&self, page: u32) -> bool {
        self.pages
            .document_page(page)
            .and_then(|doc_page| self.opened.get(&doc_page))
            .is_some_and(|opened| !opened)
    }

    /// Open the page behind display page `page` unless that was tried already.
    ///
    /// Only the first failure is reported; later calls just say the page is unusable.
    fn open_page(&mut self, page: u32) -> Result<Option<u32>, PageRenderingError> {
        let Some(doc_page) = self.pages.document_page(page) else {
            return Ok(None);
        };
        if let Some(&opened) = self.opened.get(&doc_page) {
            return Ok(opened.then_some(doc_page));
        }
        match self.document.open_page(doc_page) {
            Ok(()) => {
                self.opened.insert(doc_page, true);
                Ok(Some(doc_page))
            }
            Err(source) => {
                self.opened.insert(doc_page, false);
                log::error!("cannot open page {} (document page {}): {}", page, doc_page, source);
                Err(PageRenderingError { page, source })
            }
        }
    }

    /// Render one task.
    ///
    /// Returns `Ok(None)` when there is nothing to deliver: an empty size, an
    /// unusable page, or a buffer that could not be allocated. A failed
    /// rasterization is returned as an error so the page gets reported; the
    /// page stays open and later tasks for it are still tried.
    pub fn render(&mut self, task: &RenderingTask) -> Result<Option<Tile>, PageRenderingError> {
        let Some(doc_page) = self.open_page(task.page)? else {
            return Ok(None);
        };

        let width = round(task.width).max(0) as u32;
        let height = round(task.height).max(0) as u32;
        if width == 0 || height == 0 || task.bounds.width() <= 0.0 || task.bounds.height() <= 0.0 {
            return Ok(None);
        }

        let mut pixels = match PixelBuffer::try_new(width, height, task.quality.pixel_format()) {
            Ok(pixels) => pixels,
            Err(e) => {
                log::warn!("skipping tile of page {}: {}", task.page, e);
                return Ok(None);
            }
        };

        let page_rect = device_bounds(width, height, task.bounds);
        self.document
            .render_region(doc_page, page_rect, &mut pixels, task.annotations)
            .map_err(|source| {
                log::warn!("cannot rasterize tile of page {}: {}", task.page, source);
                PageRenderingError {
                    page: task.page,
                    source,
                }
            })?;

        Ok(Some(Tile {
            page: task.page,
            bounds: task.bounds,
            pixels,
            is_thumbnail: task.is_thumbnail,
            cache_order: task.cache_order,
        }))
    }
}
