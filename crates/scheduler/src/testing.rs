//! In-memory document and sink used by the scheduler tests.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use stripview_render::{
    DeviceRect, Document, PageRenderingError, PageSize, PixelBuffer, RenderError, Tile,
};

use crate::worker::RenderSink;

pub(crate) const WAIT: Duration = Duration::from_secs(5);

pub(crate) struct FakeDocument {
    sizes: Vec<PageSize>,
    failing: HashSet<u32>,
    failing_render: HashSet<u32>,
    gate: Option<flume::Receiver<()>>,
    rendered: Option<flume::Sender<u32>>,
    pub opens: Mutex<Vec<u32>>,
    pub renders: Mutex<Vec<(u32, DeviceRect)>>,
}

impl FakeDocument {
    pub fn new(pages: usize) -> Self {
        Self {
            sizes: vec![PageSize::new(600.0, 800.0); pages],
            failing: HashSet::new(),
            failing_render: HashSet::new(),
            gate: None,
            rendered: None,
            opens: Mutex::new(Vec::new()),
            renders: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(mut self, page: u32) -> Self {
        self.failing.insert(page);
        self
    }

    /// Page opens fine but every render of it fails.
    pub fn failing_render(mut self, page: u32) -> Self {
        self.failing_render.insert(page);
        self
    }

    /// Every render waits for one message on `gate`.
    pub fn gated(mut self, gate: flume::Receiver<()>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Reports each finished render on `rendered`.
    pub fn notify(mut self, rendered: flume::Sender<u32>) -> Self {
        self.rendered = Some(rendered);
        self
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
        self.opens.lock().unwrap().push(page_index);
        if self.failing.contains(&page_index) {
            return Err(RenderError::PageOpen("damaged page".into()));
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
        if self.failing_render.contains(&page_index) {
            return Err(RenderError::Rasterize("corrupt content stream".into()));
        }
        target.fill([page_index as u8, 0, 0, 255]);
        self.renders.lock().unwrap().push((page_index, page_rect));
        if let Some(rendered) = &self.rendered {
            rendered.send(page_index).ok();
        }
        Ok(())
    }
}

#[derive(Debug)]
pub(crate) enum SinkEvent {
    Tile { page: u32, order: u32, thumbnail: bool, printing: bool },
    Failed(PageRenderingError),
}

pub(crate) struct ChannelSink {
    events: flume::Sender<SinkEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, flume::Receiver<SinkEvent>) {
        let (events, receiver) = flume::unbounded();
        (Self { events }, receiver)
    }
}

impl RenderSink for ChannelSink {
    fn tile_rendered(&self, tile: Tile, for_printing: bool) {
        self.events
            .send(SinkEvent::Tile {
                page: tile.page,
                order: tile.cache_order,
                thumbnail: tile.is_thumbnail,
                printing: for_printing,
            })
            .ok();
    }

    fn page_failed(&self, error: PageRenderingError) {
        self.events.send(SinkEvent::Failed(error)).ok();
    }
}
