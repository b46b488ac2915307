//! Document provider abstraction
//!
//! The viewer never talks to a rasterization engine directly. A backend
//! implements [`DocumentProvider`] to open sources and [`Document`] to answer
//! page queries and rasterize page regions into [`PixelBuffer`]s.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::bitmap::PixelBuffer;

/// Errors raised while opening a document.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("document is password protected")]
    PasswordRequired,

    #[error("failed to open document: {0}")]
    OpenFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while preparing or rasterizing a single page.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RenderError {
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },

    #[error("cannot open page: {0}")]
    PageOpen(String),

    #[error("rasterization failed: {0}")]
    Rasterize(String),
}

/// Reported to the host when a page cannot be prepared for rendering.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("cannot render page {page}: {source}")]
pub struct PageRenderingError {
    pub page: u32,
    #[source]
    pub source: RenderError,
}

/// Where a document comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl From<PathBuf> for DocumentSource {
    fn from(path: PathBuf) -> Self {
        DocumentSource::Path(path)
    }
}

impl From<&Path> for DocumentSource {
    fn from(path: &Path) -> Self {
        DocumentSource::Path(path.to_path_buf())
    }
}

impl From<Vec<u8>> for DocumentSource {
    fn from(bytes: Vec<u8>) -> Self {
        DocumentSource::Bytes(bytes)
    }
}

/// Intrinsic page size in points.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Integer device-space rectangle.
///
/// Passed to [`Document::render_region`] as the placement of the *whole page*
/// relative to the target buffer origin, so negative `left`/`top` values
/// select a window further into the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl DeviceRect {
    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }
}

/// Rectangle in page points.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PageRect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
}

/// Outline entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bookmark {
    pub title: String,
    pub page_index: Option<u32>,
    pub children: Vec<Bookmark>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkTarget {
    Page(u32),
    Uri(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub bounds: PageRect,
    pub target: LinkTarget,
}

/// An opened document.
///
/// Page indices here are document page indices, not display indices; see
/// [`PageOrder`] for the mapping. Implementations must be usable from the
/// render worker thread while the UI thread queries sizes and metadata.
pub trait Document: Send + Sync {
    fn page_count(&self) -> u32;

    fn page_size(&self, page_index: u32) -> Result<PageSize, RenderError>;

    /// Prepare a page for rendering. Called at most once per page by the
    /// rasterizer, which remembers the outcome.
    fn open_page(&self, page_index: u32) -> Result<(), RenderError>;

    /// Rasterize the page placed at `page_rect` (device pixels, relative to
    /// the buffer origin) into `target`.
    fn render_region(
        &self,
        page_index: u32,
        page_rect: DeviceRect,
        target: &mut PixelBuffer,
        annotations: bool,
    ) -> Result<(), RenderError>;

    fn metadata(&self) -> DocumentMetadata {
        DocumentMetadata::default()
    }

    fn bookmarks(&self) -> Vec<Bookmark> {
        Vec::new()
    }

    fn links(&self, _page_index: u32) -> Vec<Link> {
        Vec::new()
    }
}

/// Opens documents. The returned handle is released when its last owner drops it.
pub trait DocumentProvider {
    fn open(
        &self,
        source: DocumentSource,
        password: Option<&str>,
    ) -> Result<Arc<dyn Document>, DocumentError>;
}

/// Maps display page indices to document page indices.
///
/// Without a user order the mapping is the identity over the document.
/// With one, display page `i` shows document page `order[i]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageOrder {
    document_page_count: u32,
    order: Option<Vec<u32>>,
}

impl PageOrder {
    pub fn new(document_page_count: u32, order: Option<Vec<u32>>) -> Self {
        Self {
            document_page_count,
            order,
        }
    }

    /// Number of display pages.
    pub fn len(&self) -> u32 {
        match &self.order {
            Some(order) => order.len() as u32,
            None => self.document_page_count,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Document page shown at `display_page`, if any.
    pub fn document_page(&self, display_page: u32) -> Option<u32> {
        if display_page >= self.len() {
            return None;
        }
        let page = match &self.order {
            Some(order) => order[display_page as usize],
            None => display_page,
        };
        (page < self.document_page_count).then_some(page)
    }

    /// Clamp an arbitrary page number into `[0, len - 1]`.
    pub fn clamp(&self, page: i64) -> u32 {
        if page <= 0 || self.is_empty() {
            return 0;
        }
        page.min(i64::from(self.len()) - 1) as u32
    }
}
