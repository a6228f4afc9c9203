// SPDX-License-Identifier: GPL-3.0-only

//! Live preview pipeline
//!
//! ```text
//! capture thread        worker thread                      render thread
//! ──────────────        ─────────────                      ─────────────
//! image available ──▶  acquire ▶ NV21 ▶ transform ▶ publish ──▶ drain ▶ upload ▶ draw
//!                                                  └ request render ┘
//! ```
//!
//! [`FrameProcessor`] is the producer half that runs inside the frame
//! source callback. [`LivePipeline`] wires the frame source, the processor
//! and the render loop together and owns all three.

use super::slot::PendingFrameSlot;
use super::stats::{FpsCounter, StatsObserver};
use super::transform::{FrameTransform, apply_transform};
use crate::backends::camera::{CameraDevice, CameraProvider, CaptureRequest, FrameSource};
use crate::errors::{AppResult, RenderError, TransformError};
use crate::gpu::{GpuContext, RenderLoop, Snapshot};
use crate::media::formats::SemiPlanarFrame;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{error, info};

#[derive(Debug, Default)]
struct ProcessorCounters {
    processed: AtomicU64,
    contract_violations: AtomicU64,
    last_fps: Mutex<Option<f64>>,
}

/// Producer side: transform, publish, request a render
pub struct FrameProcessor {
    transform: Box<dyn FrameTransform>,
    slot: Arc<PendingFrameSlot>,
    request_render: Box<dyn Fn() + Send>,
    processing_enabled: Arc<AtomicBool>,
    fps: FpsCounter,
    counters: Arc<ProcessorCounters>,
}

impl FrameProcessor {
    pub fn new(
        transform: Box<dyn FrameTransform>,
        slot: Arc<PendingFrameSlot>,
        request_render: impl Fn() + Send + 'static,
        processing_enabled: Arc<AtomicBool>,
        observer: Option<StatsObserver>,
    ) -> Self {
        Self {
            transform,
            slot,
            request_render: Box::new(request_render),
            processing_enabled,
            fps: FpsCounter::new(observer),
            counters: Arc::new(ProcessorCounters::default()),
        }
    }

    /// Run one converted frame through the transform and hand it to the renderer
    ///
    /// # Errors
    /// [`TransformError::ContractViolation`] when the transform returned the
    /// wrong number of bytes. Nothing is published for that frame; the next
    /// frame is processed normally.
    pub fn process(&mut self, frame: SemiPlanarFrame) -> Result<(), TransformError> {
        let mode = self.processing_enabled.load(Ordering::Relaxed);

        let transformed = match apply_transform(self.transform.as_mut(), &frame, mode) {
            Ok(transformed) => transformed,
            Err(e) => {
                self.counters
                    .contract_violations
                    .fetch_add(1, Ordering::Relaxed);
                error!(sequence = frame.sequence, error = %e, "Transform broke its output contract");
                return Err(e);
            }
        };

        self.slot.publish(transformed);
        (self.request_render)();
        self.counters.processed.fetch_add(1, Ordering::Relaxed);

        if let Some(fps) = self.fps.record_frame() {
            *self
                .counters
                .last_fps
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(fps);
        }
        Ok(())
    }

    /// Frames published so far
    pub fn frames_processed(&self) -> u64 {
        self.counters.processed.load(Ordering::Relaxed)
    }

    /// Frames rejected for a wrong-size transform output
    pub fn contract_violations(&self) -> u64 {
        self.counters.contract_violations.load(Ordering::Relaxed)
    }
}

/// Options for [`LivePipeline::start`]
pub struct PipelineOptions {
    /// Initial value of the processing toggle
    pub processing_enabled: bool,
    /// Size of the render target
    pub viewport: (u32, u32),
    /// Repeating capture request for the camera
    pub request: CaptureRequest,
    /// Receives the FPS readout
    pub observer: Option<StatsObserver>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            processing_enabled: true,
            viewport: (
                crate::constants::display::DEFAULT_VIEWPORT_WIDTH,
                crate::constants::display::DEFAULT_VIEWPORT_HEIGHT,
            ),
            request: CaptureRequest::preview(),
            observer: None,
        }
    }
}

/// Snapshot of every pipeline counter
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PipelineStats {
    /// Frames converted by the frame source
    pub frames_delivered: u64,
    /// Frames dropped for malformed planes
    pub format_errors: u64,
    /// Frames transformed and published
    pub frames_processed: u64,
    /// Frames rejected for a wrong-size transform output
    pub contract_violations: u64,
    /// Frames overwritten in the slot before they were drawn
    pub frames_dropped: u64,
    /// Quads drawn by the renderer
    pub frames_drawn: u64,
    pub texture_allocations: u64,
    pub texture_updates: u64,
    /// Rate from the last completed FPS window
    pub last_fps: Option<f64>,
    pub processing_enabled: bool,
}

/// Capture, transform and render, each on its own schedule
pub struct LivePipeline {
    source: FrameSource,
    render_loop: RenderLoop,
    slot: Arc<PendingFrameSlot>,
    processing_enabled: Arc<AtomicBool>,
    counters: Arc<ProcessorCounters>,
}

impl LivePipeline {
    /// Build the render thread, then open the camera
    ///
    /// If the camera cannot be opened the render thread is shut down again
    /// and the camera error is returned.
    pub fn start<F>(
        provider: Arc<dyn CameraProvider>,
        transform: Box<dyn FrameTransform>,
        make_context: F,
        options: PipelineOptions,
    ) -> AppResult<Self>
    where
        F: FnOnce() -> Result<Box<dyn GpuContext>, RenderError> + Send + 'static,
    {
        let slot = Arc::new(PendingFrameSlot::new());
        let mut render_loop = RenderLoop::start(make_context, Arc::clone(&slot), options.viewport)?;

        let processing_enabled = Arc::new(AtomicBool::new(options.processing_enabled));
        let render_handle = render_loop.handle();
        let mut processor = FrameProcessor::new(
            transform,
            Arc::clone(&slot),
            move || render_handle.request_render(),
            Arc::clone(&processing_enabled),
            options.observer,
        );
        let counters = Arc::clone(&processor.counters);

        let mut source = FrameSource::new(provider, move |frame| {
            // Logged and counted inside; the next frame proceeds normally
            let _ = processor.process(frame);
        })
        .with_request(options.request);

        if let Err(e) = source.start() {
            render_loop.stop();
            return Err(e.into());
        }

        info!(
            processing = options.processing_enabled,
            device = source.active_device().map(|d| d.name.as_str()).unwrap_or("unknown"),
            "Live pipeline started"
        );

        Ok(Self {
            source,
            render_loop,
            slot,
            processing_enabled,
            counters,
        })
    }

    /// Flip the processing mode, returning the new value
    pub fn toggle_processing(&self) -> bool {
        let enabled = !self.processing_enabled.fetch_xor(true, Ordering::Relaxed);
        info!(enabled, "Processing toggled");
        enabled
    }

    pub fn set_processing_enabled(&self, enabled: bool) {
        self.processing_enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn processing_enabled(&self) -> bool {
        self.processing_enabled.load(Ordering::Relaxed)
    }

    /// Resize the render target
    pub fn resize(&self, width: u32, height: u32) -> Result<(), RenderError> {
        self.render_loop.resize(width, height)
    }

    /// Read back what is currently displayed
    pub fn snapshot(&self) -> Result<Snapshot, RenderError> {
        self.render_loop.snapshot()
    }

    pub fn active_device(&self) -> Option<&CameraDevice> {
        self.source.active_device()
    }

    pub fn is_running(&self) -> bool {
        self.source.is_running()
    }

    pub fn stats(&self) -> PipelineStats {
        let source = self.source.stats();
        let render = self.render_loop.stats();
        PipelineStats {
            frames_delivered: source.frames_delivered,
            format_errors: source.format_errors,
            frames_processed: self.counters.processed.load(Ordering::Relaxed),
            contract_violations: self.counters.contract_violations.load(Ordering::Relaxed),
            frames_dropped: self.slot.dropped_frames(),
            frames_drawn: render.draws,
            texture_allocations: render.allocations,
            texture_updates: render.updates,
            last_fps: *self
                .counters
                .last_fps
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
            processing_enabled: self.processing_enabled(),
        }
    }

    /// Stop capture, then the render thread
    ///
    /// A frame already in the transform finishes; its render request may be
    /// dropped. Idempotent.
    pub fn stop(&mut self) {
        self.source.stop();
        self.render_loop.stop();
    }
}

impl Drop for LivePipeline {
    fn drop(&mut self) {
        self.stop();
    }
}
