//! Stripview Scheduler Library
//!
//! Serial render pipeline for page tiles.
//!
//! Render tasks are queued FIFO onto a single background worker. The
//! rasterization engine is not reentrant, so there is exactly one worker per
//! document session; responsiveness comes from small tiles and from
//! [`RenderWorker::flush`] dropping stale work whenever the viewport moves.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use stripview_render::{Document, PageOrder, PageRenderingError, RelativeBounds, RenderQuality, Tile};
//! use stripview_scheduler::{RenderSink, RenderWorker, RenderingTask, TileRasterizer};
//!
//! struct Printer;
//!
//! impl RenderSink for Printer {
//!     fn tile_rendered(&self, tile: Tile, _for_printing: bool) {
//!         println!("page {} ready", tile.page);
//!     }
//!
//!     fn page_failed(&self, error: PageRenderingError) {
//!         eprintln!("{}", error);
//!     }
//! }
//!
//! fn render_first_page(document: Arc<dyn Document>) -> std::io::Result<()> {
//!     let pages = PageOrder::new(document.page_count(), None);
//!     let worker = RenderWorker::spawn(TileRasterizer::new(document, pages), Arc::new(Printer))?;
//!     worker.start();
//!     worker.submit(RenderingTask {
//!         page: 0,
//!         width: 256.0,
//!         height: 256.0,
//!         bounds: RelativeBounds::FULL,
//!         is_thumbnail: true,
//!         cache_order: 0,
//!         quality: RenderQuality::Fast,
//!         annotations: false,
//!         for_printing: false,
//!     });
//!     worker.shutdown();
//!     Ok(())
//! }
//! ```

mod cancel;
mod rasterizer;
mod task;
mod worker;

#[cfg(test)]
mod testing;

pub use cancel::CancellationToken;
pub use rasterizer::{device_bounds, TileRasterizer};
pub use task::RenderingTask;
pub use worker::{RenderSink, RenderWorker, WorkerState};
