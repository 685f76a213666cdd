//! Parallel frame rendering.
//!
//! Frame tasks go into a shared queue that a fixed set of worker threads
//! drain. Each worker builds the figure for its task, rasterizes it into
//! the scratch directory and sends back a [`RenderedFrame`]. A failure or
//! panic inside one task becomes a failed result for that frame only; the
//! worker moves on to the next task.
//!
//! Results arrive in completion order. The sequencer restores index order.

use crate::figure::{build_figure, DisplayConfig};
use crate::raster::Rasterizer;
use crossbeam::channel;
use flightreel_core::report::{FrameFailure, RenderSummary};
use flightreel_core::FrameTask;
use flightreel_env::{FrameIndex, RenderStatus, RenderedFrame};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::thread;
use tracing::{debug, info, warn};

/// Renders one task into `dir`, never panicking.
pub fn render_frame(
    task: &FrameTask,
    display: &DisplayConfig,
    rasterizer: &dyn Rasterizer,
    dir: &Path,
) -> RenderedFrame {
    let index = FrameIndex(task.index);
    let path = dir.join(index.file_name());
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let figure = build_figure(task, display);
        rasterizer.rasterize(&figure, &path)
    }));

    let reason = match outcome {
        Ok(Ok(())) => return RenderedFrame::rendered(index, path),
        Ok(Err(e)) => e.to_string(),
        Err(payload) => format!("render panicked: {}", panic_message(payload.as_ref())),
    };
    warn!(frame = task.index, %reason, "Frame render failed");
    // A partial image must not reach the sequencer.
    if path.exists() {
        let _ = std::fs::remove_file(&path);
    }
    RenderedFrame::failed(index, reason)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Fixed-size pool of render workers.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    workers: usize,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Renders every task and returns one result per task.
    pub fn render_all(
        &self,
        tasks: Vec<FrameTask>,
        display: &DisplayConfig,
        rasterizer: &dyn Rasterizer,
        dir: &Path,
    ) -> Vec<RenderedFrame> {
        let total = tasks.len();
        if total == 0 {
            return Vec::new();
        }
        let progress_every = (total / 20).max(1);
        let workers = self.workers.min(total);
        info!(frames = total, workers, "Rendering frames");

        let (task_tx, task_rx) = channel::unbounded::<FrameTask>();
        let (result_tx, result_rx) = channel::unbounded::<RenderedFrame>();
        for task in tasks {
            // Receiver is alive until the end of this function.
            let _ = task_tx.send(task);
        }
        drop(task_tx);

        let mut results = Vec::with_capacity(total);
        thread::scope(|scope| {
            let mut spawned = 0;
            for id in 0..workers {
                let rx = task_rx.clone();
                let tx = result_tx.clone();
                let spawn = thread::Builder::new()
                    .name(format!("render-{}", id))
                    .spawn_scoped(scope, move || {
                        for task in rx.iter() {
                            let frame = render_frame(&task, display, rasterizer, dir);
                            if tx.send(frame).is_err() {
                                break;
                            }
                        }
                        debug!(worker = id, "Render worker done");
                    });
                match spawn {
                    Ok(_) => spawned += 1,
                    Err(e) => warn!(worker = id, error = %e, "Could not spawn render worker"),
                }
            }
            drop(result_tx);

            if spawned == 0 {
                warn!("No render workers started, rendering on the calling thread");
                for task in task_rx.try_iter() {
                    results.push(render_frame(&task, display, rasterizer, dir));
                }
                return;
            }

            for frame in result_rx.iter() {
                results.push(frame);
                let done = results.len();
                if done % progress_every == 0 || done == total {
                    info!("Rendered {}/{} frames", done, total);
                }
            }
        });
        results
    }
}

/// Counts successes and failures for the run report.
pub fn summarize(results: &[RenderedFrame], workers: usize) -> RenderSummary {
    let mut failed: Vec<FrameFailure> = results
        .iter()
        .filter_map(|r| match &r.status {
            RenderStatus::Failed(reason) => Some(FrameFailure {
                index: r.index.0,
                reason: reason.clone(),
            }),
            RenderStatus::Rendered(_) => None,
        })
        .collect();
    failed.sort_by_key(|f| f.index);
    RenderSummary {
        attempted: results.len(),
        succeeded: results.iter().filter(|r| r.is_success()).count(),
        failed,
        workers,
    }
}
