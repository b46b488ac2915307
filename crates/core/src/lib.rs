//! Stripview Core Library
//!
//! Viewer orchestration for tiled document rendering.
//!
//! A [`Viewer`] lays pages out on one long strip, works out which tiles the
//! viewport needs, feeds them to a background render worker and keeps the
//! results in a bounded cache that a [`Compositor`] draws from. Notifications
//! go to a single [`ViewerEvents`] sink.
//!
//! The `pdfium` feature re-exports a PDFium backed document provider.

pub mod compositor;
pub mod config;
pub mod error;
pub mod events;
pub mod viewer;

pub use compositor::{Compositor, DestRect};
pub use config::{ConfigError, ViewerConfig};
pub use error::{ViewerError, ViewerResult};
pub use events::{NoopEvents, ViewerEvents};
pub use viewer::{LoadRequest, SnapEdge, Viewer};

pub use stripview_cache::{CacheSnapshot, CacheStats};
pub use stripview_render::{
    Bookmark, Document, DocumentError, DocumentMetadata, DocumentProvider, DocumentSource,
    FitPolicy, Link, LinkTarget, PageRenderingError, RenderQuality, ScrollAxis, SpacingConfig,
    Tile, ViewportSize,
};

#[cfg(feature = "pdfium")]
pub use stripview_render::PdfiumProvider;
