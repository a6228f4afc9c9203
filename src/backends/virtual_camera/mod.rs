// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic capture device
//!
//! [`TestPatternCamera`] behaves like a hardware camera from the frame
//! source's point of view: it enumerates a front and a back device, opens a
//! repeating capture into a bounded image pool and fires the image-available
//! callback from its own thread.
//!
//! # Image pool
//!
//! ```text
//! capture ──▶ [ready images] ──acquire_latest──▶ [outstanding] ──drop──▶ free
//! ```
//!
//! At most `max_images` images exist at once. Acquiring takes the newest
//! ready image and discards older ones. While every slot is outstanding the
//! device cannot produce, so a consumer that never releases stalls capture.

mod pattern;

pub use pattern::ChromaLayout;

use crate::backends::camera::types::*;
use crate::backends::camera::{CameraProvider, CaptureSession};
use crate::constants::capture;
use crate::errors::CameraError;
use crate::worker::{LoopAction, WorkerLoop};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;
use tracing::{debug, info, trace};

/// When the device produces frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureTrigger {
    /// Produce frames at a fixed rate on a background thread
    Timer { fps: u32 },
    /// Produce a frame only when [`TestPatternCamera::capture_frame`] is called
    Manual,
}

/// Test pattern device configuration
#[derive(Debug, Clone)]
pub struct TestPatternConfig {
    pub layout: ChromaLayout,
    pub trigger: CaptureTrigger,
    /// Devices reported by enumeration
    pub devices: Vec<CameraDevice>,
    /// When set, every `open` fails with this reason
    pub fail_open: Option<String>,
}

impl Default for TestPatternConfig {
    fn default() -> Self {
        Self {
            layout: ChromaLayout::default(),
            trigger: CaptureTrigger::Timer {
                fps: capture::TEST_PATTERN_FPS,
            },
            devices: default_devices(),
            fail_open: None,
        }
    }
}

fn default_devices() -> Vec<CameraDevice> {
    vec![
        CameraDevice {
            id: "test-pattern-front".to_string(),
            name: "Test Pattern (front)".to_string(),
            facing: LensFacing::Front,
        },
        CameraDevice {
            id: "test-pattern-back".to_string(),
            name: "Test Pattern (back)".to_string(),
            facing: LensFacing::Back,
        },
    ]
}

/// Counters kept by the device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Frames written into the pool
    pub captured: u64,
    /// Ready frames discarded unseen because a newer one replaced them
    pub discarded: u64,
    /// Captures skipped because every slot was outstanding
    pub stalled: u64,
    /// Images currently held by consumers
    pub outstanding: usize,
}

struct PoolState {
    ready: VecDeque<PlanarImage>,
    outstanding: usize,
    stats: PoolStats,
}

struct SessionShared {
    width: u32,
    height: u32,
    max_images: usize,
    layout: ChromaLayout,
    pool: Mutex<PoolState>,
    next_sequence: AtomicU64,
    closed: AtomicBool,
    on_image_available: ImageAvailableCallback,
}

impl SessionShared {
    fn pool(&self) -> std::sync::MutexGuard<'_, PoolState> {
        self.pool.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Produce one frame into the pool; `false` if the pool was full
    fn capture(&self) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }

        {
            let mut pool = self.pool();
            if pool.outstanding >= self.max_images {
                pool.stats.stalled += 1;
                trace!("Image pool exhausted, skipping capture");
                return false;
            }

            let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
            pool.ready
                .push_back(pattern::generate(self.width, self.height, sequence, self.layout));
            pool.stats.captured += 1;

            while pool.ready.len() + pool.outstanding > self.max_images {
                pool.ready.pop_front();
                pool.stats.discarded += 1;
            }
        }

        (self.on_image_available)();
        true
    }

    fn release(&self) {
        let mut pool = self.pool();
        pool.outstanding = pool.outstanding.saturating_sub(1);
    }
}

struct TestPatternSession {
    shared: Arc<SessionShared>,
    timer: Mutex<Option<WorkerLoop>>,
}

impl CaptureSession for TestPatternSession {
    fn acquire_latest_image(&self) -> Option<CapturedImage> {
        let image = {
            let mut pool = self.shared.pool();
            let newest = pool.ready.pop_back()?;
            let older = pool.ready.len() as u64;
            pool.ready.clear();
            pool.stats.discarded += older;
            pool.outstanding += 1;
            newest
        };

        let shared = Arc::clone(&self.shared);
        Some(CapturedImage::new(image, move || shared.release()))
    }

    fn close(&self) {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(mut timer) = self
            .timer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            timer.stop();
        }
        self.shared.pool().ready.clear();
        debug!("Test pattern session closed");
    }
}

impl Drop for TestPatternSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// Synthetic camera provider
pub struct TestPatternCamera {
    config: TestPatternConfig,
    active: Mutex<Weak<SessionShared>>,
}

impl TestPatternCamera {
    pub fn new(config: TestPatternConfig) -> Self {
        Self {
            config,
            active: Mutex::new(Weak::new()),
        }
    }

    /// Manually triggered device, for deterministic tests
    pub fn manual(layout: ChromaLayout) -> Self {
        Self::new(TestPatternConfig {
            layout,
            trigger: CaptureTrigger::Manual,
            ..Default::default()
        })
    }

    /// Produce one frame on the most recently opened session
    ///
    /// Returns `false` when no session is open or its pool is exhausted.
    pub fn capture_frame(&self) -> bool {
        self.active_session()
            .map(|session| session.capture())
            .unwrap_or(false)
    }

    /// Pool counters of the most recently opened session
    pub fn pool_stats(&self) -> Option<PoolStats> {
        self.active_session().map(|session| {
            let pool = session.pool();
            PoolStats {
                outstanding: pool.outstanding,
                ..pool.stats
            }
        })
    }

    fn active_session(&self) -> Option<Arc<SessionShared>> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .upgrade()
    }
}

impl Default for TestPatternCamera {
    fn default() -> Self {
        Self::new(TestPatternConfig::default())
    }
}

impl CameraProvider for TestPatternCamera {
    fn enumerate_cameras(&self) -> Vec<CameraDevice> {
        self.config.devices.clone()
    }

    fn open(
        &self,
        device: &CameraDevice,
        request: &CaptureRequest,
        on_image_available: ImageAvailableCallback,
    ) -> BackendResult<Box<dyn CaptureSession>> {
        if let Some(reason) = &self.config.fail_open {
            return Err(CameraError::DeviceUnavailable(reason.clone()));
        }
        if !self.config.devices.iter().any(|d| d.id == device.id) {
            return Err(CameraError::DeviceUnavailable(format!(
                "Unknown device {}",
                device.id
            )));
        }

        let shared = Arc::new(SessionShared {
            width: request.width,
            height: request.height,
            max_images: request.max_images.max(1),
            layout: self.config.layout,
            pool: Mutex::new(PoolState {
                ready: VecDeque::new(),
                outstanding: 0,
                stats: PoolStats::default(),
            }),
            next_sequence: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            on_image_available,
        });

        let timer = match self.config.trigger {
            CaptureTrigger::Timer { fps } => {
                let period = Duration::from_secs_f64(1.0 / fps.max(1) as f64);
                let timer_shared = Arc::clone(&shared);
                Some(WorkerLoop::start("test-pattern", move || {
                    std::thread::sleep(period);
                    timer_shared.capture();
                    LoopAction::Continue
                }))
            }
            CaptureTrigger::Manual => None,
        };

        info!(
            device = %device.name,
            layout = %self.config.layout,
            request = %request,
            "Test pattern capture started"
        );

        *self.active.lock().unwrap_or_else(PoisonError::into_inner) = Arc::downgrade(&shared);

        Ok(Box::new(TestPatternSession {
            shared,
            timer: Mutex::new(timer),
        }))
    }
}
