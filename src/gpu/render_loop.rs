// SPDX-License-Identifier: GPL-3.0-only

//! Render thread
//!
//! The renderer and its GPU context are built on, and never leave, a
//! dedicated thread. Other threads talk to it through a [`RenderHandle`]:
//! render requests coalesce on a dirty flag so at most one draw is queued
//! no matter how fast frames are published.

use super::renderer::{Renderer, RendererStats};
use super::{GpuContext, Snapshot};
use crate::constants::timing;
use crate::errors::RenderError;
use crate::pipelines::slot::PendingFrameSlot;
use crate::worker::{LoopAction, WorkerLoop};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

enum RenderCommand {
    Draw,
    Resize(u32, u32),
    Snapshot(mpsc::Sender<Result<Snapshot, RenderError>>),
}

/// Cloneable handle for requesting work from the render thread
#[derive(Clone)]
pub struct RenderHandle {
    dirty: Arc<AtomicBool>,
    commands: mpsc::Sender<RenderCommand>,
}

impl RenderHandle {
    /// Ask for a draw; a no-op when one is already queued
    pub fn request_render(&self) {
        if !self.dirty.swap(true, Ordering::AcqRel) {
            // Send only fails once the render thread is gone
            let _ = self.commands.send(RenderCommand::Draw);
        }
    }
}

/// Owner of the render thread
pub struct RenderLoop {
    handle: RenderHandle,
    stats: Arc<Mutex<RendererStats>>,
    worker: WorkerLoop,
}

impl RenderLoop {
    /// Start the render thread
    ///
    /// `make_context` runs on the new thread. This call returns once the
    /// renderer has been built and sized to `viewport`, or with the error
    /// that prevented it.
    pub fn start<F>(
        make_context: F,
        slot: Arc<PendingFrameSlot>,
        viewport: (u32, u32),
    ) -> Result<Self, RenderError>
    where
        F: FnOnce() -> Result<Box<dyn GpuContext>, RenderError> + Send + 'static,
    {
        let dirty = Arc::new(AtomicBool::new(false));
        let (commands_tx, commands_rx) = mpsc::channel::<RenderCommand>();
        let stats = Arc::new(Mutex::new(RendererStats::default()));

        let loop_dirty = Arc::clone(&dirty);
        let loop_stats = Arc::clone(&stats);

        let worker = WorkerLoop::start_with_init(
            "render",
            move || {
                let mut renderer = Renderer::new(make_context()?)?;
                renderer.surface_changed(viewport.0, viewport.1)?;
                Ok::<_, RenderError>(renderer)
            },
            move |renderer: &mut Renderer| {
                let command = match commands_rx.recv_timeout(timing::WORKER_POLL_INTERVAL) {
                    Ok(command) => command,
                    Err(RecvTimeoutError::Timeout) => return LoopAction::Continue,
                    Err(RecvTimeoutError::Disconnected) => {
                        debug!("Render command channel closed");
                        return LoopAction::Stop;
                    }
                };

                match command {
                    RenderCommand::Draw => {
                        // Cleared before drawing so a request made mid-draw queues another
                        loop_dirty.store(false, Ordering::Release);
                        if let Err(e) = renderer.draw_frame(&slot) {
                            warn!(error = %e, "Draw failed");
                        }
                        *loop_stats.lock().unwrap_or_else(PoisonError::into_inner) =
                            renderer.stats();
                    }
                    RenderCommand::Resize(width, height) => {
                        if let Err(e) = renderer.surface_changed(width, height) {
                            warn!(error = %e, width, height, "Resize failed");
                        }
                    }
                    RenderCommand::Snapshot(reply) => {
                        let _ = reply.send(renderer.snapshot());
                    }
                }
                LoopAction::Continue
            },
        )?;

        info!(width = viewport.0, height = viewport.1, "Render loop started");

        Ok(Self {
            handle: RenderHandle {
                dirty,
                commands: commands_tx,
            },
            stats,
            worker,
        })
    }

    /// Handle for the producer side
    pub fn handle(&self) -> RenderHandle {
        self.handle.clone()
    }

    pub fn request_render(&self) {
        self.handle.request_render();
    }

    /// Change the target size
    pub fn resize(&self, width: u32, height: u32) -> Result<(), RenderError> {
        self.handle
            .commands
            .send(RenderCommand::Resize(width, height))
            .map_err(|_| RenderError::Disconnected)
    }

    /// Read the target back, waiting for queued commands to run first
    pub fn snapshot(&self) -> Result<Snapshot, RenderError> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.handle
            .commands
            .send(RenderCommand::Snapshot(reply_tx))
            .map_err(|_| RenderError::Disconnected)?;
        reply_rx.recv().map_err(|_| RenderError::Disconnected)?
    }

    /// Counters as of the last completed draw
    pub fn stats(&self) -> RendererStats {
        *self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_running()
    }

    /// Stop the thread; a draw in progress completes first
    pub fn stop(&mut self) {
        self.worker.stop();
    }
}
