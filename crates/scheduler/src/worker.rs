//! Background render worker
//!
//! One named thread per document session pulls [`RenderingTask`]s off an
//! unbounded channel in submission order and hands finished tiles to a
//! [`RenderSink`]. The worker starts out stopped; while stopped it still
//! works through its queue but drops every result.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use stripview_render::{PageRenderingError, Tile};

use crate::cancel::CancellationToken;
use crate::rasterizer::TileRasterizer;
use crate::task::RenderingTask;

/// Receives the worker's results on the worker thread.
pub trait RenderSink: Send + Sync {
    fn tile_rendered(&self, tile: Tile, for_printing: bool);

    fn page_failed(&self, error: PageRenderingError);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Stopped,
    Running,
}

enum Request {
    Render(RenderingTask),
    Shutdown,
}

/// Handle to the render thread.
///
/// The handle keeps a receiver of its own so [`RenderWorker::flush`] can
/// discard queued tasks without involving the worker thread.
pub struct RenderWorker {
    sender: flume::Sender<Request>,
    queue: flume::Receiver<Request>,
    running: Arc<AtomicBool>,
    token: CancellationToken,
    thread: Option<JoinHandle<()>>,
}

impl RenderWorker {
    /// Spawn the worker thread in the stopped state.
    pub fn spawn(rasterizer: TileRasterizer, sink: Arc<dyn RenderSink>) -> std::io::Result<Self> {
        let (sender, queue) = flume::unbounded();
        let running = Arc::new(AtomicBool::new(false));
        let token = CancellationToken::new();

        let thread = {
            let requests = queue.clone();
            let running = Arc::clone(&running);
            let token = token.clone();
            thread::Builder::new()
                .name("stripview-render-worker".to_string())
                .spawn(move || run(rasterizer, requests, sink, running, token))?
        };

        Ok(Self {
            sender,
            queue,
            running,
            token,
            thread: Some(thread),
        })
    }

    /// Start delivering results.
    pub fn start(&self) {
        self.running.store(true, Ordering::Release);
    }

    /// Stop delivering results. Tasks still run but their tiles are dropped.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn state(&self) -> WorkerState {
        if self.running.load(Ordering::Acquire) {
            WorkerState::Running
        } else {
            WorkerState::Stopped
        }
    }

    /// Queue a task behind everything already submitted.
    ///
    /// Returns `false` once the worker has been shut down.
    pub fn submit(&self, task: RenderingTask) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        self.sender.send(Request::Render(task)).is_ok()
    }

    /// Discard every task that has not started yet.
    ///
    /// A task already being rasterized is not interrupted.
    pub fn flush(&self) -> usize {
        let discarded = self.queue.drain().count();
        if discarded > 0 {
            log::debug!("flushed {} queued render tasks", discarded);
        }
        discarded
    }

    /// Number of queued tasks.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    fn signal_shutdown(&self) {
        self.stop();
        self.token.cancel();
        self.flush();
        // The thread may already be gone
        let _ = self.sender.send(Request::Shutdown);
    }

    /// Stop the worker and wait for the thread to exit.
    ///
    /// Blocks until the task in progress, if any, has finished.
    pub fn shutdown(mut self) {
        self.signal_shutdown();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("render worker panicked");
            }
        }
    }

    /// Stop the worker without waiting for it.
    ///
    /// A task in progress finishes in the background and its result is dropped.
    pub fn shutdown_nowait(mut self) {
        self.signal_shutdown();
        self.thread.take();
    }
}

impl Drop for RenderWorker {
    fn drop(&mut self) {
        if self.thread.take().is_some() {
            self.signal_shutdown();
        }
    }
}

fn run(
    mut rasterizer: TileRasterizer,
    requests: flume::Receiver<Request>,
    sink: Arc<dyn RenderSink>,
    running: Arc<AtomicBool>,
    token: CancellationToken,
) {
    log::debug!("render worker started");

    for request in requests.iter() {
        let task = match request {
            Request::Render(task) => task,
            Request::Shutdown => break,
        };
        if token.is_cancelled() {
            break;
        }

        match rasterizer.render(&task) {
            Ok(Some(tile)) => {
                if running.load(Ordering::Acquire) && !token.is_cancelled() {
                    sink.tile_rendered(tile, task.for_printing);
                } else {
                    log::debug!("dropping tile of page {} rendered while stopped", tile.page);
                }
            }
            Ok(None) => {}
            Err(error) => {
                if !token.is_cancelled() {
                    sink.page_failed(error);
                }
            }
        }
    }

    log::debug!("render worker exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ChannelSink, FakeDocument, SinkEvent, WAIT};
    use stripview_render::{Document, PageOrder, RelativeBounds, RenderQuality};

    fn task(page: u32, order: u32) -> RenderingTask {
        RenderingTask {
            page,
            width: 64.0,
            height: 64.0,
            bounds: RelativeBounds::FULL,
            is_thumbnail: order == 0,
            cache_order: order,
            quality: RenderQuality::Fast,
            annotations: false,
            for_printing: false,
        }
    }

    fn spawn(document: FakeDocument) -> (RenderWorker, flume::Receiver<SinkEvent>, Arc<FakeDocument>) {
        let document = Arc::new(document);
        let pages = PageOrder::new(document.page_count(), None);
        let (sink, events) = ChannelSink::new();
        let rasterizer = TileRasterizer::new(Arc::clone(&document) as Arc<dyn Document>, pages);
        let worker = RenderWorker::spawn(rasterizer, Arc::new(sink)).unwrap();
        (worker, events, document)
    }

    fn next_tile(events: &flume::Receiver<SinkEvent>) -> (u32, u32) {
        match events.recv_timeout(WAIT).unwrap() {
            SinkEvent::Tile { page, order, .. } => (page, order),
            SinkEvent::Failed(e) => panic!("unexpected failure: {}", e),
        }
    }

    #[test]
    fn test_worker_starts_stopped() {
        let (worker, _events, _) = spawn(FakeDocument::new(1));
        assert_eq!(worker.state(), WorkerState::Stopped);
        worker.start();
        assert_eq!(worker.state(), WorkerState::Running);
        worker.stop();
        assert_eq!(worker.state(), WorkerState::Stopped);
        worker.shutdown();
    }

    #[test]
    fn test_tasks_complete_in_submission_order() {
        let (worker, events, _) = spawn(FakeDocument::new(4));
        worker.start();

        for (page, order) in [(2, 5), (0, 1), (3, 9), (1, 0)] {
            assert!(worker.submit(task(page, order)));
        }

        let delivered: Vec<_> = (0..4).map(|_| next_tile(&events)).collect();
        assert_eq!(delivered, vec![(2, 5), (0, 1), (3, 9), (1, 0)]);
        worker.shutdown();
    }

    #[test]
    fn test_flush_discards_queued_tasks() {
        let (gate_tx, gate_rx) = flume::unbounded();
        let (worker, events, _) = spawn(FakeDocument::new(8).gated(gate_rx));
        worker.start();

        worker.submit(task(0, 1));
        // wait until the first task is in progress
        while worker.pending() > 0 {
            thread::yield_now();
        }
        for page in 1..6 {
            worker.submit(task(page, page + 1));
        }
        assert_eq!(worker.flush(), 5);
        assert_eq!(worker.pending(), 0);

        gate_tx.send(()).unwrap();
        assert_eq!(next_tile(&events), (0, 1));

        worker.submit(task(7, 8));
        gate_tx.send(()).unwrap();
        assert_eq!(next_tile(&events), (7, 8));
        worker.shutdown();
    }

    #[test]
    fn test_stopped_worker_drops_results() {
        let (rendered_tx, rendered_rx) = flume::unbounded();
        let (worker, events, _) = spawn(FakeDocument::new(3).notify(rendered_tx));

        worker.submit(task(0, 1));
        worker.submit(task(1, 2));
        // once page 1 is rendered, the page 0 result has been dropped
        assert_eq!(rendered_rx.recv_timeout(WAIT).unwrap(), 0);
        assert_eq!(rendered_rx.recv_timeout(WAIT).unwrap(), 1);

        worker.start();
        worker.submit(task(2, 3));
        loop {
            let (page, _) = next_tile(&events);
            assert_ne!(page, 0);
            if page == 2 {
                break;
            }
        }
        worker.shutdown();
    }

    #[test]
    fn test_page_failure_is_delivered() {
        let (worker, events, _) = spawn(FakeDocument::new(3).failing(2));
        worker.start();

        worker.submit(task(2, 1));
        worker.submit(task(2, 2));
        worker.submit(task(1, 3));

        match events.recv_timeout(WAIT).unwrap() {
            SinkEvent::Failed(e) => assert_eq!(e.page, 2),
            other => panic!("expected failure, got {:?}", other),
        }
        // the second task for page 2 is skipped without another report
        assert_eq!(next_tile(&events), (1, 3));
        worker.shutdown();
    }

    #[test]
    fn test_rasterize_failure_is_delivered_per_tile() {
        let (worker, events, _) = spawn(FakeDocument::new(2).failing_render(0));
        worker.start();

        worker.submit(task(0, 1));
        worker.submit(task(0, 2));
        worker.submit(task(1, 3));

        for _ in 0..2 {
            match events.recv_timeout(WAIT).unwrap() {
                SinkEvent::Failed(e) => {
                    assert_eq!(e.page, 0);
                    assert!(matches!(e.source, stripview_render::RenderError::Rasterize(_)));
                }
                other => panic!("expected failure, got {:?}", other),
            }
        }
        assert_eq!(next_tile(&events), (1, 3));
        worker.shutdown();
    }

    #[test]
    fn test_printing_flag_is_passed_through() {
        let (worker, events, _) = spawn(FakeDocument::new(1));
        worker.start();

        worker.submit(RenderingTask {
            for_printing: true,
            ..task(0, 0)
        });
        match events.recv_timeout(WAIT).unwrap() {
            SinkEvent::Tile {
                thumbnail, printing, ..
            } => {
                assert!(thumbnail);
                assert!(printing);
            }
            other => panic!("expected tile, got {:?}", other),
        }
        worker.shutdown();
    }

    #[test]
    fn test_in_flight_task_finishes_silently_after_stop() {
        let (gate_tx, gate_rx) = flume::unbounded();
        let (worker, events, document) = spawn(FakeDocument::new(4).gated(gate_rx));
        worker.start();

        worker.submit(task(0, 1));
        while worker.pending() > 0 {
            thread::yield_now();
        }
        worker.submit(task(1, 2));
        worker.submit(task(2, 3));

        worker.stop();
        worker.flush();
        gate_tx.send(()).unwrap();
        worker.shutdown();

        assert!(events.try_recv().is_err());
        let rendered: Vec<u32> = document.renders.lock().unwrap().iter().map(|(page, _)| *page).collect();
        assert_eq!(rendered, vec![0]);
    }

    #[test]
    fn test_submit_after_shutdown_signal_is_refused() {
        let (worker, _events, _) = spawn(FakeDocument::new(1));
        worker.signal_shutdown();
        assert!(!worker.submit(task(0, 1)));
        worker.shutdown();
    }

    #[test]
    fn test_shutdown_nowait_returns_immediately() {
        let (_gate_tx, gate_rx) = flume::unbounded::<()>();
        let (worker, events, _) = spawn(FakeDocument::new(1).gated(gate_rx));
        worker.start();
        worker.submit(task(0, 1));

        worker.shutdown_nowait();
        assert!(events.try_recv().is_err());
    }
}
