//! Shared fakes for the viewer integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use stripview_core::{
    Bookmark, Compositor, DestRect, Document, DocumentError, DocumentMetadata, DocumentProvider,
    DocumentSource, Link, LinkTarget, PageRenderingError, Tile, ViewerError, ViewerEvents,
    ViewportSize,
};
use stripview_render::{DeviceRect, PageRect, PageSize, PixelBuffer, RenderError};

pub const WAIT: Duration = Duration::from_secs(5);

pub const VIEWPORT: ViewportSize = ViewportSize::new(300, 500);

pub struct FakeDocument {
    sizes: Vec<PageSize>,
    failing: HashSet<u32>,
    gate: Option<flume::Receiver<()>>,
    pub renders: Mutex<Vec<(u32, DeviceRect)>>,
}

impl FakeDocument {
    /// `pages` pages of 600 x 800 points.
    pub fn new(pages: usize) -> Self {
        Self::with_sizes(vec![PageSize::new(600.0, 800.0); pages])
    }

    pub fn with_sizes(sizes: Vec<PageSize>) -> Self {
        Self {
            sizes,
            failing: HashSet::new(),
            gate: None,
            renders: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(mut self, page: u32) -> Self {
        self.failing.insert(page);
        self
    }

    /// Every render waits for one message on `gate`.
    pub fn gated(mut self, gate: flume::Receiver<()>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn render_count(&self) -> usize {
        self.renders.lock().unwrap().len()
    }
}

impl Document for FakeDocument {
    fn page_count(&self) -> u32 {
        self.sizes.len() as u32
    }

    fn page_size(&self, page_index: u32) -> Result<PageSize, RenderError> {
        self.sizes
            .get(page_index as usize)
            .copied()
            .ok_or(RenderError::PageOutOfRange {
                page: page_index,
                page_count: self.page_count(),
            })
    }

    fn open_page(&self, page_index: u32) -> Result<(), RenderError> {
        if self.failing.contains(&page_index) {
            return Err(RenderError::PageOpen("broken content stream".into()));
        }
        Ok(())
    }

    fn render_region(
        &self,
        page_index: u32,
        page_rect: DeviceRect,
        target: &mut PixelBuffer,
        _annotations: bool,
    ) -> Result<(), RenderError> {
        if let Some(gate) = &self.gate {
            gate.recv_timeout(WAIT).ok();
        }
        target.fill([page_index as u8, 128, 0, 255]);
        self.renders.lock().unwrap().push((page_index, page_rect));
        Ok(())
    }

    fn metadata(&self) -> DocumentMetadata {
        DocumentMetadata {
            title: Some("Quarterly report".into()),
            author: Some("Finance".into()),
            ..DocumentMetadata::default()
        }
    }

    fn bookmarks(&self) -> Vec<Bookmark> {
        vec![Bookmark {
            title: "Summary".into(),
            page_index: Some(0),
            children: vec![Bookmark {
                title: "Figures".into(),
                page_index: Some(1),
                children: Vec::new(),
            }],
        }]
    }

    fn links(&self, page_index: u32) -> Vec<Link> {
        vec![Link {
            bounds: PageRect {
                left: 10.0,
                top: 10.0,
                right: 50.0,
                bottom: 20.0,
            },
            target: LinkTarget::Uri(format!("https://example.com/page/{}", page_index)),
        }]
    }
}

/// Hands out one shared document, optionally behind a password.
pub struct FakeProvider {
    pub document: Arc<FakeDocument>,
    password: Option<String>,
}

impl FakeProvider {
    pub fn new(document: FakeDocument) -> Self {
        Self {
            document: Arc::new(document),
            password: None,
        }
    }

    pub fn with_password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }
}

impl DocumentProvider for FakeProvider {
    fn open(&self, source: DocumentSource, password: Option<&str>) -> Result<Arc<dyn Document>, DocumentError> {
        if let DocumentSource::Bytes(bytes) = &source {
            if bytes.is_empty() {
                return Err(DocumentError::OpenFailed("not a PDF".into()));
            }
        }
        if self.password.is_some() && self.password.as_deref() != password {
            return Err(DocumentError::PasswordRequired);
        }
        Ok(Arc::clone(&self.document) as Arc<dyn Document>)
    }
}

pub fn source() -> DocumentSource {
    DocumentSource::Bytes(b"%PDF-1.7".to_vec())
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    LoadComplete(u32),
    LoadError(String),
    PasswordRequired,
    PageChanged(u32, u32),
    PageError(u32),
    InitiallyRendered(u32),
    Redraw,
    BitmapsReady(Vec<u32>),
}

/// Forwards every event except scrolling to a channel.
pub struct RecordingEvents {
    events: flume::Sender<Event>,
    pub scrolled: Mutex<Vec<(u32, f32)>>,
}

impl RecordingEvents {
    pub fn new() -> (Arc<Self>, flume::Receiver<Event>) {
        let (events, receiver) = flume::unbounded();
        let recorder = Arc::new(Self {
            events,
            scrolled: Mutex::new(Vec::new()),
        });
        (recorder, receiver)
    }

    fn send(&self, event: Event) {
        self.events.send(event).ok();
    }
}

impl ViewerEvents for RecordingEvents {
    fn on_load_complete(&self, page_count: u32) {
        self.send(Event::LoadComplete(page_count));
    }

    fn on_load_error(&self, error: &ViewerError) {
        self.send(Event::LoadError(error.to_string()));
    }

    fn on_password_required(&self) {
        self.send(Event::PasswordRequired);
    }

    fn on_page_changed(&self, page: u32, page_count: u32) {
        self.send(Event::PageChanged(page, page_count));
    }

    fn on_page_scrolled(&self, page: u32, position: f32) {
        self.scrolled.lock().unwrap().push((page, position));
    }

    fn on_page_error(&self, error: &PageRenderingError) {
        self.send(Event::PageError(error.page));
    }

    fn on_initially_rendered(&self, page_count: u32) {
        self.send(Event::InitiallyRendered(page_count));
    }

    fn on_redraw_requested(&self) {
        self.send(Event::Redraw);
    }

    fn on_bitmaps_ready(&self, thumbnails: Vec<Arc<Tile>>) {
        let mut pages: Vec<u32> = thumbnails.iter().map(|tile| tile.page).collect();
        pages.sort_unstable();
        self.send(Event::BitmapsReady(pages));
    }
}

/// Everything received so far without waiting.
pub fn drain(events: &flume::Receiver<Event>) -> Vec<Event> {
    events.drain().collect()
}

/// Wait for `count` redraw requests, collecting everything else seen on the way.
pub fn wait_for_redraws(events: &flume::Receiver<Event>, count: usize) -> Vec<Event> {
    let mut seen = Vec::new();
    let mut redraws = 0;
    while redraws < count {
        let event = events
            .recv_timeout(WAIT)
            .unwrap_or_else(|_| panic!("only {} of {} redraws arrived", redraws, count));
        if event == Event::Redraw {
            redraws += 1;
        }
        seen.push(event);
    }
    seen
}

/// Wait for the first event matching `predicate`.
pub fn wait_for(events: &flume::Receiver<Event>, predicate: impl Fn(&Event) -> bool) -> Event {
    loop {
        let event = events.recv_timeout(WAIT).expect("timed out waiting for event");
        if predicate(&event) {
            return event;
        }
    }
}

#[derive(Default)]
pub struct RecordingCompositor {
    pub drawn: Vec<(u32, bool, DestRect)>,
}

impl Compositor for RecordingCompositor {
    fn draw_tile(&mut self, tile: &Tile, destination: DestRect) {
        self.drawn.push((tile.page, tile.is_thumbnail, destination));
    }
}

pub fn assert_close(actual: f32, expected: f32) {
    assert!(
        (actual - expected).abs() < 0.01,
        "expected {}, got {}",
        expected,
        actual
    );
}
