//! Viewer orchestrator
//!
//! [`Viewer`] owns the scroll position and zoom of one viewport and ties the
//! pieces together: the [`DocumentLayout`] places pages on the strip, the
//! [`TileGridPlanner`] picks the cells around the viewport, the
//! [`RenderWorker`] rasterizes them and the [`TileCache`] keeps the results
//! for [`Viewer::draw`].
//!
//! Scroll offsets are document coordinates of the viewport's top-left corner
//! at the current zoom. They go negative when content smaller than the
//! viewport is centred.
//!
//! Every loaded document gets its own session with a fresh cache and worker.
//! Recycling stops the worker and drops the session, so a tile that finishes
//! after that lands in a cache nobody reads anymore.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use stripview_cache::{CacheSnapshot, CacheStats, TileCache};
use stripview_render::{
    Bookmark, Document, DocumentLayout, DocumentMetadata, DocumentProvider, DocumentSource, Link,
    PageOrder, PageRenderingError, PageSize, RelativeBounds, ScrollAxis, Tile, TileGridPlanner,
    ViewportSize, VisibleWindow,
};
use stripview_scheduler::{RenderSink, RenderWorker, RenderingTask, TileRasterizer};

use crate::compositor::{Compositor, DestRect};
use crate::config::ViewerConfig;
use crate::error::{ViewerError, ViewerResult};
use crate::events::ViewerEvents;

/// What to open and how to present it.
#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub source: DocumentSource,
    pub password: Option<String>,
    /// Display order as document page indices. Repeats are allowed.
    pub pages: Option<Vec<u32>>,
    /// Display page shown once the document is open.
    pub default_page: u32,
}

impl LoadRequest {
    pub fn new(source: impl Into<DocumentSource>) -> Self {
        Self {
            source: source.into(),
            password: None,
            pages: None,
            default_page: 0,
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_pages(mut self, pages: Vec<u32>) -> Self {
        self.pages = Some(pages);
        self
    }

    pub fn with_default_page(mut self, page: u32) -> Self {
        self.default_page = page;
        self
    }
}

/// Where a page should line up with the viewport after a snap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapEdge {
    Start,
    Center,
    End,
    None,
}

/// Receives worker results and files them into the session's cache.
struct TileDelivery {
    cache: Arc<TileCache>,
    events: Arc<dyn ViewerEvents>,
    page_count: u32,
    initially_rendered: AtomicBool,
}

impl RenderSink for TileDelivery {
    fn tile_rendered(&self, tile: Tile, for_printing: bool) {
        if !self.initially_rendered.swap(true, Ordering::AcqRel) {
            self.events.on_initially_rendered(self.page_count);
        }

        if tile.is_thumbnail {
            let page = tile.page;
            self.cache.insert_thumbnail(tile, for_printing);
            if for_printing && page + 1 == self.page_count {
                self.events.on_bitmaps_ready(self.cache.snapshot().thumbnails);
            }
        } else {
            self.cache.insert(tile);
        }
        self.events.on_redraw_requested();
    }

    fn page_failed(&self, error: PageRenderingError) {
        log::error!("cannot render page {}: {}", error.page, error.source);
        self.events.on_page_error(&error);
    }
}

/// Everything tied to one open document.
struct Session {
    document: Arc<dyn Document>,
    pages: PageOrder,
    layout: DocumentLayout,
    cache: Arc<TileCache>,
    worker: RenderWorker,
}

impl Session {
    /// Queue a whole-page thumbnail unless one is cached already.
    fn schedule_thumbnail(&self, page: u32, config: &ViewerConfig, events: &dyn ViewerEvents, for_printing: bool) {
        if !self.cache.contains_thumbnail(page, RelativeBounds::FULL) {
            let ratio = if for_printing {
                config.printing_thumbnail_ratio
            } else {
                config.thumbnail_ratio
            };
            self.worker.submit(RenderingTask::thumbnail(
                page,
                self.layout.page_size(page),
                ratio,
                config.render_quality,
                config.annotation_rendering,
                for_printing,
            ));
        } else if for_printing && page + 1 == self.pages.len() {
            events.on_bitmaps_ready(self.cache.snapshot().thumbnails);
        }
    }
}

/// Scrollable, zoomable view over one document at a time.
pub struct Viewer {
    config: ViewerConfig,
    planner: TileGridPlanner,
    events: Arc<dyn ViewerEvents>,
    viewport: ViewportSize,
    session: Option<Session>,
    scroll_x: f32,
    scroll_y: f32,
    zoom: f32,
    current_page: u32,
}

impl Viewer {
    /// Create a viewer. The configuration is validated here, before any
    /// document work happens.
    pub fn new(config: ViewerConfig, events: Arc<dyn ViewerEvents>) -> ViewerResult<Self> {
        config.validate()?;
        Ok(Self {
            planner: TileGridPlanner::new(config.tile_size),
            zoom: config.min_zoom,
            config,
            events,
            viewport: ViewportSize::default(),
            session: None,
            scroll_x: 0.0,
            scroll_y: 0.0,
            current_page: 0,
        })
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn is_loaded(&self) -> bool {
        self.session.is_some()
    }

    /// Number of display pages, 0 when nothing is loaded.
    pub fn page_count(&self) -> u32 {
        self.session.as_ref().map(|s| s.pages.len()).unwrap_or(0)
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn viewport(&self) -> ViewportSize {
        self.viewport
    }

    /// Scroll offset as `(x, y)`.
    pub fn scroll(&self) -> (f32, f32) {
        (self.scroll_x, self.scroll_y)
    }

    pub fn layout(&self) -> Option<&DocumentLayout> {
        self.session.as_ref().map(|s| &s.layout)
    }

    /// Tasks queued on the render worker.
    pub fn pending_tasks(&self) -> usize {
        self.session.as_ref().map(|s| s.worker.pending()).unwrap_or(0)
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.session.as_ref().map(|s| s.cache.stats())
    }

    /// Everything cached for the current document.
    pub fn snapshot(&self) -> CacheSnapshot {
        match &self.session {
            Some(session) => session.cache.snapshot(),
            None => CacheSnapshot::empty(),
        }
    }

    /// Open a document and show its default page.
    ///
    /// Any document already loaded is recycled first. On failure the viewer
    /// is left recycled and exactly one of
    /// [`ViewerEvents::on_password_required`] or [`ViewerEvents::on_load_error`]
    /// is reported.
    pub fn load(
        &mut self,
        provider: &dyn DocumentProvider,
        request: LoadRequest,
        viewport: ViewportSize,
    ) -> ViewerResult<u32> {
        self.recycle();
        self.viewport = viewport;

        let session = match self.open_session(provider, request.source, request.password.as_deref(), request.pages) {
            Ok(session) => session,
            Err(error) => return Err(self.load_failed(error)),
        };
        let page_count = session.pages.len();
        session.worker.start();
        self.session = Some(session);

        log::debug!("loaded document with {} display pages", page_count);
        self.events.on_load_complete(page_count);
        self.jump_to(request.default_page);
        Ok(page_count)
    }

    fn open_session(
        &self,
        provider: &dyn DocumentProvider,
        source: DocumentSource,
        password: Option<&str>,
        order: Option<Vec<u32>>,
    ) -> ViewerResult<Session> {
        let document = provider.open(source, password)?;
        let pages = PageOrder::new(document.page_count(), order);
        if pages.is_empty() {
            return Err(ViewerError::EmptyDocument);
        }

        let sizes = (0..pages.len())
            .map(|page| match pages.document_page(page) {
                Some(doc_page) => document.page_size(doc_page).unwrap_or_else(|e| {
                    log::warn!("cannot read size of page {}: {}", doc_page, e);
                    PageSize::default()
                }),
                None => PageSize::default(),
            })
            .collect();
        let layout = DocumentLayout::new(sizes, self.viewport, self.config.layout_options());

        let cache = Arc::new(TileCache::new(self.config.cache_size, self.config.thumbnail_cache_size));
        let delivery = Arc::new(TileDelivery {
            cache: Arc::clone(&cache),
            events: Arc::clone(&self.events),
            page_count: pages.len(),
            initially_rendered: AtomicBool::new(false),
        });
        let rasterizer = TileRasterizer::new(Arc::clone(&document), pages.clone());
        let worker = RenderWorker::spawn(rasterizer, delivery)?;

        Ok(Session {
            document,
            pages,
            layout,
            cache,
            worker,
        })
    }

    fn load_failed(&mut self, error: ViewerError) -> ViewerError {
        self.recycle();
        log::error!("cannot load document: {}", error);
        if error.is_password_required() {
            self.events.on_password_required();
        } else {
            self.events.on_load_error(&error);
        }
        error
    }

    /// Drop the current document and everything derived from it.
    ///
    /// A tile still being rasterized finishes in the background and is discarded.
    pub fn recycle(&mut self) {
        if let Some(session) = self.session.take() {
            let Session { worker, cache, .. } = session;
            worker.shutdown_nowait();
            cache.clear();
            log::debug!("viewer recycled");
        }
        self.scroll_x = 0.0;
        self.scroll_y = 0.0;
        self.zoom = self.config.min_zoom;
        self.current_page = 0;
    }

    fn axis(&self) -> ScrollAxis {
        self.config.scroll_axis
    }

    fn viewport_main(&self) -> f32 {
        match self.axis() {
            ScrollAxis::Vertical => self.viewport.height as f32,
            ScrollAxis::Horizontal => self.viewport.width as f32,
        }
    }

    fn main_scroll(&self) -> f32 {
        match self.axis() {
            ScrollAxis::Vertical => self.scroll_y,
            ScrollAxis::Horizontal => self.scroll_x,
        }
    }

    fn move_main_to(&mut self, offset: f32) {
        match self.axis() {
            ScrollAxis::Vertical => self.move_to(self.scroll_x, offset),
            ScrollAxis::Horizontal => self.move_to(offset, self.scroll_y),
        }
    }

    /// Follow a viewport size change, keeping the point under the viewport
    /// centre at the same relative position of the strip.
    pub fn resize(&mut self, viewport: ViewportSize) {
        let old = self.viewport;
        self.viewport = viewport;
        let zoom = self.zoom;
        let axis = self.axis();
        let Some(session) = self.session.as_mut() else {
            return;
        };

        let centre_x = self.scroll_x + old.width as f32 * 0.5;
        let centre_y = self.scroll_y + old.height as f32 * 0.5;
        let cross = axis.cross(session.layout.max_page_size()) * zoom;
        let length = session.layout.doc_len(zoom);
        let (rel_x, rel_y) = match axis {
            ScrollAxis::Vertical => (ratio(centre_x, cross), ratio(centre_y, length)),
            ScrollAxis::Horizontal => (ratio(centre_x, length), ratio(centre_y, cross)),
        };

        session.layout.recalculate(viewport);

        let cross = axis.cross(session.layout.max_page_size()) * zoom;
        let length = session.layout.doc_len(zoom);
        let (x, y) = match axis {
            ScrollAxis::Vertical => (rel_x * cross, rel_y * length),
            ScrollAxis::Horizontal => (rel_x * length, rel_y * cross),
        };
        self.move_to(x - viewport.width as f32 * 0.5, y - viewport.height as f32 * 0.5);
        self.load_page_by_offset();
    }

    /// Scroll to (`x`, `y`), keeping the strip on screen.
    ///
    /// Content narrower than the viewport is centred; otherwise the offset is
    /// clamped to the content. The leading and trailing spacing stay out of view.
    pub fn move_to(&mut self, x: f32, y: f32) {
        let Some(session) = &self.session else {
            return;
        };
        let layout = &session.layout;
        let zoom = self.zoom;
        let spacing = self.config.spacing;
        let width = self.viewport.width as f32;
        let height = self.viewport.height as f32;
        let cross = self.axis().cross(layout.max_page_size()) * zoom;
        let length = layout.doc_len(zoom);
        let (start, end) = (spacing.start * zoom, spacing.end * zoom);

        let (x, y) = match self.axis() {
            ScrollAxis::Vertical => (
                clamp_cross(x, cross, width),
                clamp_main(y, length, height, start, end),
            ),
            ScrollAxis::Horizontal => (
                clamp_main(x, length, width, start, end),
                clamp_cross(y, cross, height),
            ),
        };
        self.scroll_x = x;
        self.scroll_y = y;

        self.events.on_page_scrolled(self.current_page, self.position_offset());
    }

    pub fn move_relative_to(&mut self, dx: f32, dy: f32) {
        self.move_to(self.scroll_x + dx, self.scroll_y + dy);
    }

    /// Zoom while keeping the document point under `pivot` fixed.
    ///
    /// `pivot` is in viewport coordinates. The zoom is clamped to the
    /// configured minimum and maximum.
    pub fn zoom_centered_to(&mut self, zoom: f32, pivot: (f32, f32)) {
        let zoom = zoom.clamp(self.config.min_zoom, self.config.max_zoom);
        let factor = zoom / self.zoom;
        self.zoom = zoom;
        let x = self.scroll_x * factor + pivot.0 * (factor - 1.0);
        let y = self.scroll_y * factor + pivot.1 * (factor - 1.0);
        self.move_to(x, y);
    }

    pub fn zoom_centered_relative_to(&mut self, factor: f32, pivot: (f32, f32)) {
        self.zoom_centered_to(self.zoom * factor, pivot);
    }

    /// Back to the minimum zoom, clamping the current position.
    pub fn reset_zoom(&mut self) {
        self.zoom = self.config.min_zoom;
        self.move_to(self.scroll_x, self.scroll_y);
    }

    /// Zoom so `page` fills the viewport width, then jump to it.
    ///
    /// The zoom is not clamped to the configured levels.
    pub fn fit_to_width(&mut self, page: u32) {
        let Some(session) = &self.session else {
            return;
        };
        let page_width = session.layout.page_size(page).width;
        if page_width <= 0.0 {
            return;
        }
        self.zoom = self.viewport.width as f32 / page_width;
        self.jump_to(page);
    }

    /// Schedule everything around the viewport.
    ///
    /// Queued tasks are abandoned and the cache starts a new generation.
    /// Thumbnails for every touched page go first, then the grid cells in
    /// order of their cache priority.
    pub fn load_pages(&self) {
        let Some(session) = &self.session else {
            return;
        };
        session.worker.flush();
        session.cache.begin_new_generation();

        let window = VisibleWindow::new(
            self.scroll_x,
            self.scroll_y,
            self.viewport.width as f32,
            self.viewport.height as f32,
            self.config.preload_offset(),
        );
        let ranges = self.planner.render_ranges(&session.layout, &window, self.zoom);

        for range in &ranges {
            session.schedule_thumbnail(range.page, &self.config, self.events.as_ref(), false);
        }

        let mut order = 1;
        let mut submitted = 0;
        'ranges: for range in &ranges {
            for cell in self.planner.cells(range) {
                if !session.cache.upgrade_if_present(cell.page, cell.bounds, order) {
                    let task = RenderingTask::tile(
                        &cell,
                        order,
                        self.config.render_quality,
                        self.config.annotation_rendering,
                    );
                    if session.worker.submit(task) {
                        submitted += 1;
                    }
                }
                order += 1;
                if order as usize > self.config.cache_size {
                    break 'ranges;
                }
            }
        }

        log::debug!(
            "planned {} cells over {} pages, {} to render",
            order - 1,
            ranges.len(),
            submitted
        );
    }

    /// Queue a printing-quality thumbnail of every page.
    ///
    /// [`ViewerEvents::on_bitmaps_ready`] fires once the last page's
    /// thumbnail is cached.
    pub fn load_pages_for_printing(&self) {
        let Some(session) = &self.session else {
            return;
        };
        session.worker.flush();
        session.cache.begin_new_generation();
        for page in 0..session.pages.len() {
            session.schedule_thumbnail(page, &self.config, self.events.as_ref(), true);
        }
    }

    /// Make the page under the viewport centre current, then load pages.
    pub fn load_page_by_offset(&mut self) {
        let Some(session) = &self.session else {
            return;
        };
        let centre = self.main_scroll() + self.viewport_main() / 2.0;
        let page = session.layout.page_at_offset(centre, self.zoom);
        if page < session.pages.len() && page != self.current_page {
            self.show_page(page);
        } else {
            self.load_pages();
        }
    }

    /// Make `page` current without scrolling.
    pub fn show_page(&mut self, page: u32) {
        let Some(session) = &self.session else {
            return;
        };
        let page_count = session.pages.len();
        self.current_page = session.pages.clamp(i64::from(page));
        self.load_pages();
        self.events.on_page_changed(self.current_page, page_count);
    }

    /// Scroll so `page` starts at the top (or left) of the viewport.
    pub fn jump_to(&mut self, page: u32) {
        let Some(session) = &self.session else {
            return;
        };
        let page = session.pages.clamp(i64::from(page));
        let offset = session.layout.page_offset(page, self.zoom) - self.config.spacing.page_separator;
        self.move_main_to(offset);
        self.show_page(page);
    }

    /// Scroll progress along the strip in `[0, 1]`.
    pub fn position_offset(&self) -> f32 {
        let Some(session) = &self.session else {
            return 0.0;
        };
        let scrollable = session.layout.doc_len(self.zoom) - self.viewport_main();
        if scrollable <= 0.0 {
            return 0.0;
        }
        (self.main_scroll() / scrollable).clamp(0.0, 1.0)
    }

    /// Scroll to a progress value in `[0, 1]` and load pages there.
    pub fn set_position_offset(&mut self, progress: f32) {
        let Some(session) = &self.session else {
            return;
        };
        let offset = (session.layout.doc_len(self.zoom) - self.viewport_main()) * progress;
        self.move_main_to(offset);
        self.load_page_by_offset();
    }

    pub fn page_at_position_offset(&self, progress: f32) -> u32 {
        let Some(session) = &self.session else {
            return 0;
        };
        let layout = &session.layout;
        layout.page_at_offset(layout.doc_len(self.zoom) * progress, self.zoom)
    }

    /// Page that should own the viewport when scrolled to (`x`, `y`).
    ///
    /// Near either end of the strip the first or last page wins so both stay reachable.
    pub fn find_focus_page(&self, x: f32, y: f32) -> u32 {
        let Some(session) = &self.session else {
            return 0;
        };
        let offset = match self.axis() {
            ScrollAxis::Vertical => y,
            ScrollAxis::Horizontal => x,
        };
        let length = self.viewport_main();
        if offset < 1.0 {
            return 0;
        }
        if offset > session.layout.doc_len(self.zoom) - length - 1.0 {
            return session.pages.len() - 1;
        }
        session.layout.page_at_offset(offset + length / 2.0, self.zoom)
    }

    pub fn find_snap_edge(&self, page: u32) -> SnapEdge {
        let Some(session) = &self.session else {
            return SnapEdge::None;
        };
        if !self.config.page_snap {
            return SnapEdge::None;
        }
        let scroll = self.main_scroll();
        let offset = session.layout.page_offset(page, self.zoom);
        let length = self.viewport_main();
        let page_length = session.layout.page_length(page, self.zoom);

        if length >= page_length {
            SnapEdge::Center
        } else if scroll <= offset {
            SnapEdge::Start
        } else if offset + page_length < scroll + length {
            SnapEdge::End
        } else {
            SnapEdge::None
        }
    }

    /// Main-axis scroll offset that aligns `page` with the viewport at `edge`.
    pub fn snap_offset_for_page(&self, page: u32, edge: SnapEdge) -> f32 {
        let Some(session) = &self.session else {
            return 0.0;
        };
        let offset = session.layout.page_offset(page, self.zoom);
        let length = self.viewport_main();
        let page_length = session.layout.page_length(page, self.zoom);
        match edge {
            SnapEdge::Center => offset - length / 2.0 + page_length / 2.0,
            SnapEdge::End => offset - length + page_length,
            SnapEdge::Start | SnapEdge::None => offset,
        }
    }

    /// Snap the focused page to its nearest edge.
    ///
    /// Returns `false` when snapping is off or nothing needs to move.
    pub fn perform_page_snap(&mut self) -> bool {
        if !self.config.page_snap || self.page_count() == 0 {
            return false;
        }
        let page = self.find_focus_page(self.scroll_x, self.scroll_y);
        let edge = self.find_snap_edge(page);
        if edge == SnapEdge::None {
            return false;
        }
        let offset = self.snap_offset_for_page(page, edge);
        self.move_main_to(offset);
        self.load_page_by_offset();
        true
    }

    /// Whether the current page alone covers the viewport along the scroll axis.
    pub fn page_fills_screen(&self) -> bool {
        let Some(session) = &self.session else {
            return false;
        };
        let start = session.layout.page_offset(self.current_page, self.zoom);
        let end = start + session.layout.page_length(self.current_page, self.zoom);
        let scroll = self.main_scroll();
        start < scroll && end > scroll + self.viewport_main()
    }

    /// Whether the whole document fits the viewport at zoom 1.
    pub fn document_fits_view(&self) -> bool {
        match &self.session {
            Some(session) => session.layout.doc_len(1.0) < self.viewport_main(),
            None => false,
        }
    }

    /// Viewport rectangle of a cached tile, `None` when it is off screen.
    fn destination(&self, layout: &DocumentLayout, tile: &Tile) -> Option<DestRect> {
        let zoom = self.zoom;
        let size = layout.page_size(tile.page);
        let main = layout.page_offset(tile.page, zoom);
        let cross = layout.secondary_page_offset(tile.page, zoom);
        let (page_x, page_y) = match self.axis() {
            ScrollAxis::Vertical => (cross, main),
            ScrollAxis::Horizontal => (main, cross),
        };

        let bounds = tile.bounds;
        let left = bounds.left * size.width * zoom;
        let top = bounds.top * size.height * zoom;
        let width = bounds.width() * size.width * zoom;
        let height = bounds.height() * size.height * zoom;

        // Truncate in page space so adjacent tiles meet on the same pixel.
        let x = page_x - self.scroll_x;
        let y = page_y - self.scroll_y;
        let destination = DestRect {
            left: x + left.trunc(),
            top: y + top.trunc(),
            right: x + (left + width).trunc(),
            bottom: y + (top + height).trunc(),
        };
        destination
            .intersects_viewport(self.viewport.width as f32, self.viewport.height as f32)
            .then_some(destination)
    }

    /// Draw every visible cached tile, thumbnails first so sharper tiles
    /// cover them. Returns the number of tiles drawn.
    pub fn draw(&self, compositor: &mut dyn Compositor) -> usize {
        let Some(session) = &self.session else {
            return 0;
        };
        let snapshot = session.cache.snapshot();
        let mut drawn = 0;
        for tile in snapshot.thumbnails.iter().chain(snapshot.tiles.iter()) {
            if let Some(destination) = self.destination(&session.layout, tile) {
                compositor.draw_tile(tile, destination);
                drawn += 1;
            }
        }
        drawn
    }

    pub fn metadata(&self) -> Option<DocumentMetadata> {
        self.session.as_ref().map(|s| s.document.metadata())
    }

    /// Table of contents, empty until a document is loaded.
    pub fn bookmarks(&self) -> Vec<Bookmark> {
        self.session
            .as_ref()
            .map(|s| s.document.bookmarks())
            .unwrap_or_default()
    }

    /// Links on display page `page`.
    pub fn links(&self, page: u32) -> Vec<Link> {
        self.session
            .as_ref()
            .and_then(|s| s.pages.document_page(page).map(|doc_page| s.document.links(doc_page)))
            .unwrap_or_default()
    }
}

impl Drop for Viewer {
    fn drop(&mut self) {
        self.recycle();
    }
}

fn ratio(value: f32, total: f32) -> f32 {
    if total > 0.0 {
        value / total
    } else {
        0.0
    }
}

fn clamp_cross(offset: f32, content: f32, view: f32) -> f32 {
    if content < view {
        -(view - content) / 2.0
    } else {
        offset.clamp(0.0, content - view)
    }
}

fn clamp_main(offset: f32, content: f32, view: f32, start: f32, end: f32) -> f32 {
    if content < view {
        -(view - content) / 2.0
    } else if offset < start {
        start
    } else if offset > content - view - end {
        content - view - end
    } else {
        offset
    }
}
