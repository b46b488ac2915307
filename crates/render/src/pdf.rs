//! PDFium backend
//!
//! Implements [`DocumentProvider`] and [`Document`] on top of `pdfium-render`.

use pdfium_render::prelude::*;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use crate::bitmap::PixelBuffer;
use crate::document::{
    Bookmark, DeviceRect, Document, DocumentError, DocumentMetadata, DocumentProvider,
    DocumentSource, Link, LinkTarget, PageRect, PageSize, RenderError,
};

/// Opens documents with a process-lifetime PDFium binding.
pub struct PdfiumProvider {
    pdfium: &'static Pdfium,
    passwords: PasswordPool,
}

/// Passwords handed to PDFium.
///
/// `load_pdf_from_*` ties the password borrow to the returned document, and
/// documents here live as long as the binding, so each distinct password is
/// stored once for the life of the process.
#[derive(Default)]
struct PasswordPool {
    entries: Mutex<HashSet<&'static str>>,
}

impl PasswordPool {
    fn intern(&self, password: &str) -> &'static str {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(&stored) = entries.get(password) {
            return stored;
        }
        let stored: &'static str = Box::leak(password.to_owned().into_boxed_str());
        entries.insert(stored);
        stored
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl PdfiumProvider {
    /// Bind to the PDFium library.
    ///
    /// Search order:
    /// 1. Executable's directory
    /// 2. Current working directory
    /// 3. System library paths
    pub fn new() -> Result<Self, DocumentError> {
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()));

        let bindings = exe_dir
            .and_then(|dir| {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&dir)).ok()
            })
            .map(Ok)
            .unwrap_or_else(|| {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                    .or_else(|_| Pdfium::bind_to_system_library())
            })
            .map_err(|e| DocumentError::OpenFailed(format!("cannot bind PDFium: {}", e)))?;

        // Documents borrow the binding, so it lives for the rest of the process.
        let pdfium: &'static Pdfium = Box::leak(Box::new(Pdfium::new(bindings)));
        Ok(Self {
            pdfium,
            passwords: PasswordPool::default(),
        })
    }
}

impl DocumentProvider for PdfiumProvider {
    fn open(
        &self,
        source: DocumentSource,
        password: Option<&str>,
    ) -> Result<Arc<dyn Document>, DocumentError> {
        let password = password.map(|p| self.passwords.intern(p));
        let document = match source {
            DocumentSource::Path(path) => {
                if !path.exists() {
                    return Err(DocumentError::Io(std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        format!("{} not found", path.display()),
                    )));
                }
                self.pdfium.load_pdf_from_file(&path, password)
            }
            DocumentSource::Bytes(bytes) => self.pdfium.load_pdf_from_byte_vec(bytes, password),
        }
        .map_err(|e| match e {
            PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError) => {
                DocumentError::PasswordRequired
            }
            other => DocumentError::OpenFailed(other.to_string()),
        })?;

        log::debug!("opened PDF with {} pages", document.pages().len());
        Ok(Arc::new(PdfiumDocument {
            document: Mutex::new(document),
        }))
    }
}

/// An open PDF. PDFium is not reentrant, so every call goes through one lock.
pub struct PdfiumDocument {
    document: Mutex<pdfium_render::prelude::PdfDocument<'static>>,
}

impl PdfiumDocument {
    fn with_page<T>(
        &self,
        page_index: u32,
        f: impl FnOnce(&PdfPage<'_>) -> Result<T, RenderError>,
    ) -> Result<T, RenderError> {
        let document = self.document.lock().unwrap_or_else(PoisonError::into_inner);
        let page_count = u32::from(document.pages().len());
        let index = u16::try_from(page_index)
            .ok()
            .filter(|_| page_index < page_count)
            .ok_or(RenderError::PageOutOfRange {
                page: page_index,
                page_count,
            })?;
        let page = document
            .pages()
            .get(index)
            .map_err(|e| RenderError::PageOpen(e.to_string()))?;
        f(&page)
    }
}

impl Document for PdfiumDocument {
    fn page_count(&self) -> u32 {
        let document = self.document.lock().unwrap_or_else(PoisonError::into_inner);
        u32::from(document.pages().len())
    }

    fn page_size(&self, page_index: u32) -> Result<PageSize, RenderError> {
        self.with_page(page_index, |page| {
            Ok(PageSize::new(page.width().value, page.height().value))
        })
    }

    fn open_page(&self, page_index: u32) -> Result<(), RenderError> {
        self.with_page(page_index, |_| Ok(()))
    }

    fn render_region(
        &self,
        page_index: u32,
        page_rect: DeviceRect,
        target: &mut PixelBuffer,
        annotations: bool,
    ) -> Result<(), RenderError> {
        if page_rect.width() <= 0 || page_rect.height() <= 0 {
            return Err(RenderError::Rasterize(format!(
                "empty page rect {}x{}",
                page_rect.width(),
                page_rect.height()
            )));
        }
        self.with_page(page_index, |page| {
            // Render the page at the requested device size, then copy out the tile window.
            let config = PdfRenderConfig::new()
                .set_target_width(page_rect.width())
                .set_target_height(page_rect.height())
                .render_annotations(annotations);
            let bitmap = page
                .render_with_config(&config)
                .map_err(|e| RenderError::Rasterize(e.to_string()))?;
            let rgba = bitmap.as_rgba_bytes();

            target.fill([255, 255, 255, 255]);
            target.blit_rgba(
                &rgba,
                page_rect.width() as u32,
                page_rect.height() as u32,
                -i64::from(page_rect.left),
                -i64::from(page_rect.top),
            );
            Ok(())
        })
    }

    fn metadata(&self) -> DocumentMetadata {
        let document = self.document.lock().unwrap_or_else(PoisonError::into_inner);
        let meta = document.metadata();
        let tag = |kind| meta.get(kind).map(|v| v.value().to_string());

        DocumentMetadata {
            title: tag(PdfDocumentMetadataTagType::Title),
            author: tag(PdfDocumentMetadataTagType::Author),
            subject: tag(PdfDocumentMetadataTagType::Subject),
            keywords: tag(PdfDocumentMetadataTagType::Keywords),
            creator: tag(PdfDocumentMetadataTagType::Creator),
            producer: tag(PdfDocumentMetadataTagType::Producer),
            creation_date: tag(PdfDocumentMetadataTagType::CreationDate),
            modification_date: tag(PdfDocumentMetadataTagType::ModificationDate),
        }
    }

    fn bookmarks(&self) -> Vec<Bookmark> {
        let document = self.document.lock().unwrap_or_else(PoisonError::into_inner);
        let mut bookmarks = Vec::new();
        let mut current = document.bookmarks().root();
        while let Some(bookmark) = current {
            bookmarks.push(collect_bookmark(&bookmark));
            current = bookmark.next_sibling();
        }
        bookmarks
    }

    fn links(&self, page_index: u32) -> Vec<Link> {
        self.with_page(page_index, |page| {
            let links = page
                .links()
                .iter()
                .filter_map(|link| {
                    let rect = link.rect().ok()?;
                    let target = match link.action() {
                        Some(PdfAction::Uri(action)) => LinkTarget::Uri(action.uri().ok()?),
                        _ => {
                            let index = link.destination()?.page_index().ok()?;
                            LinkTarget::Page(u32::from(index))
                        }
                    };
                    Some(Link {
                        bounds: PageRect {
                            left: rect.left.value,
                            top: rect.top.value,
                            right: rect.right.value,
                            bottom: rect.bottom.value,
                        },
                        target,
                    })
                })
                .collect();
            Ok(links)
        })
        .unwrap_or_else(|e| {
            log::warn!("cannot read links of page {}: {}", page_index, e);
            Vec::new()
        })
    }
}

fn collect_bookmark(bookmark: &PdfBookmark<'_>) -> Bookmark {
    let mut children = Vec::new();
    let mut child = bookmark.first_child();
    while let Some(current) = child {
        children.push(collect_bookmark(&current));
        child = current.next_sibling();
    }

    Bookmark {
        title: bookmark.title().unwrap_or_default(),
        page_index: bookmark
            .destination()
            .and_then(|dest| dest.page_index().ok())
            .map(u32::from),
        children,
    }
}
