//! Stripview Render Library
//!
//! Page geometry, tile grid planning and the document provider seam used by
//! the tile scheduler. The rasterization engine itself sits behind the
//! [`Document`] trait; the optional `pdfium` feature provides a PDFium backend.

pub mod bitmap;
pub mod document;
pub mod layout;
#[cfg(feature = "pdfium")]
pub mod pdf;
pub mod tile;

pub use bitmap::{AllocationError, PixelBuffer, PixelFormat, RenderQuality};
pub use document::{
    Bookmark, DeviceRect, Document, DocumentError, DocumentMetadata, DocumentProvider,
    DocumentSource, Link, LinkTarget, PageOrder, PageRect, PageRenderingError, PageSize,
    RenderError,
};
pub use layout::{
    DocumentLayout, FitPolicy, LayoutOptions, PageLayout, PageSizeCalculator, ScrollAxis, SizeF,
    SpacingConfig, ViewportSize,
};
#[cfg(feature = "pdfium")]
pub use pdf::{PdfiumDocument, PdfiumProvider};
pub use tile::{
    GridCell, GridSize, PlannedCell, RelativeBounds, RenderRange, Tile, TileGridPlanner, TileKey,
    VisibleWindow, TILE_SIZE,
};
