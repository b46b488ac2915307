//! Render task model

use stripview_render::{PlannedCell, RelativeBounds, RenderQuality, SizeF};

/// One queued rasterization request. Immutable once submitted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderingTask {
    /// Display page index.
    pub page: u32,
    /// Requested pixel width, rounded when the buffer is allocated.
    pub width: f32,
    pub height: f32,
    pub bounds: RelativeBounds,
    pub is_thumbnail: bool,
    /// Cache priority; lower is more important. Thumbnails use 0.
    pub cache_order: u32,
    pub quality: RenderQuality,
    pub annotations: bool,
    pub for_printing: bool,
}

impl RenderingTask {
    /// Task for a planned grid cell.
    pub fn tile(cell: &PlannedCell, cache_order: u32, quality: RenderQuality, annotations: bool) -> Self {
        Self {
            page: cell.page,
            width: cell.render_width,
            height: cell.render_height,
            bounds: cell.bounds,
            is_thumbnail: false,
            cache_order,
            quality,
            annotations,
            for_printing: false,
        }
    }

    /// Whole-page thumbnail at `ratio` of the page's layout size.
    pub fn thumbnail(
        page: u32,
        page_size: SizeF,
        ratio: f32,
        quality: RenderQuality,
        annotations: bool,
        for_printing: bool,
    ) -> Self {
        Self {
            page,
            width: page_size.width * ratio,
            height: page_size.height * ratio,
            bounds: RelativeBounds::FULL,
            is_thumbnail: true,
            cache_order: 0,
            quality,
            annotations,
            for_printing,
        }
    }
}
