// SPDX-License-Identifier: GPL-3.0-only

//! Camera frame source
//!
//! Owns the capture session for the rear camera. Every time the device
//! reports a completed capture, a dedicated worker thread acquires the
//! newest image, repacks it to NV21 and hands the result to the registered
//! frame callback. Frames are processed one at a time in capture order.

use super::types::*;
use super::{CameraProvider, CaptureSession, select_back_facing};
use crate::constants::timing;
use crate::errors::CameraError;
use crate::media::formats::nv21::{self, SemiPlanarFrame};
use crate::worker::{LoopAction, WorkerLoop};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, TrySendError};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Callback receiving each converted frame on the worker thread
pub type FrameCallback = Box<dyn FnMut(SemiPlanarFrame) + Send>;

/// Counters for frames seen by the worker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameSourceStats {
    /// Frames converted and handed to the callback
    pub frames_delivered: u64,
    /// Frames dropped because their plane geometry was malformed
    pub format_errors: u64,
}

#[derive(Default)]
struct Counters {
    frames_delivered: AtomicU64,
    format_errors: AtomicU64,
}

/// Active capture: the open session plus the worker draining it
struct RunningCapture {
    device: CameraDevice,
    session: Arc<dyn CaptureSession>,
    worker: WorkerLoop,
}

/// Rear camera frame source
pub struct FrameSource {
    provider: Arc<dyn CameraProvider>,
    request: CaptureRequest,
    on_frame: Arc<Mutex<FrameCallback>>,
    counters: Arc<Counters>,
    running: Option<RunningCapture>,
}

impl FrameSource {
    /// Create a stopped frame source
    ///
    /// `on_frame` is called exactly once per successfully converted frame,
    /// always from the worker thread.
    pub fn new(
        provider: Arc<dyn CameraProvider>,
        on_frame: impl FnMut(SemiPlanarFrame) + Send + 'static,
    ) -> Self {
        Self {
            provider,
            request: CaptureRequest::preview(),
            on_frame: Arc::new(Mutex::new(Box::new(on_frame))),
            counters: Arc::new(Counters::default()),
            running: None,
        }
    }

    /// Use a different capture request for the next `start`
    pub fn with_request(mut self, request: CaptureRequest) -> Self {
        self.request = request;
        self
    }

    /// Begin asynchronous capture from the first back-facing camera
    ///
    /// Calling this while already running is a no-op.
    ///
    /// # Returns
    /// * `Ok(())` - Capture is running
    /// * `Err(CameraError::NoSuitableDevice)` - No back-facing camera
    /// * `Err(CameraError::DeviceUnavailable)` - Open failed; the source stays stopped
    pub fn start(&mut self) -> Result<(), CameraError> {
        if self.running.is_some() {
            debug!("Frame source already running");
            return Ok(());
        }

        let devices = self.provider.enumerate_cameras();
        let device = select_back_facing(&devices)?.clone();

        info!(device = %device.name, request = %self.request, "Opening camera");

        // Wakeups coalesce: the device only ever hands out its newest image,
        // so one pending notification is enough to drain it.
        let (notify_tx, notify_rx) = mpsc::sync_channel::<()>(1);
        let on_image_available: ImageAvailableCallback = Arc::new(move || {
            if let Err(TrySendError::Disconnected(())) = notify_tx.try_send(()) {
                debug!("Image available after the worker stopped");
            }
        });

        let session: Arc<dyn CaptureSession> = match self.provider.open(
            &device,
            &self.request,
            on_image_available,
        ) {
            Ok(session) => Arc::from(session),
            Err(e) => {
                warn!(device = %device.name, error = %e, "Failed to open camera");
                return Err(match e {
                    CameraError::NoSuitableDevice => CameraError::DeviceUnavailable(e.to_string()),
                    unavailable => unavailable,
                });
            }
        };

        let worker_session = Arc::clone(&session);
        let on_frame = Arc::clone(&self.on_frame);
        let counters = Arc::clone(&self.counters);

        let worker = WorkerLoop::start("frame-source", move || {
            match notify_rx.recv_timeout(timing::WORKER_POLL_INTERVAL) {
                Ok(()) => {
                    process_latest_image(worker_session.as_ref(), &on_frame, &counters);
                    LoopAction::Continue
                }
                Err(RecvTimeoutError::Timeout) => LoopAction::Continue,
                Err(RecvTimeoutError::Disconnected) => {
                    debug!("Camera notification channel closed");
                    LoopAction::Stop
                }
            }
        });

        self.running = Some(RunningCapture {
            device,
            session,
            worker,
        });

        Ok(())
    }

    /// Stop capture and release the device
    ///
    /// Idempotent. A frame that is already being converted or transformed
    /// finishes first; no new frame is started afterwards.
    pub fn stop(&mut self) {
        if let Some(mut running) = self.running.take() {
            info!(device = %running.device.name, "Stopping camera");
            running.worker.stop();
            running.session.close();
        }
    }

    /// Check if capture is running
    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Device currently being captured from
    pub fn active_device(&self) -> Option<&CameraDevice> {
        self.running.as_ref().map(|running| &running.device)
    }

    /// Capture request used when opening the device
    pub fn request(&self) -> &CaptureRequest {
        &self.request
    }

    /// Snapshot of the worker counters
    pub fn stats(&self) -> FrameSourceStats {
        FrameSourceStats {
            frames_delivered: self.counters.frames_delivered.load(Ordering::Relaxed),
            format_errors: self.counters.format_errors.load(Ordering::Relaxed),
        }
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One unit of worker work: acquire, convert, deliver, release
fn process_latest_image(
    session: &dyn CaptureSession,
    on_frame: &Mutex<FrameCallback>,
    counters: &Counters,
) {
    let Some(image) = session.acquire_latest_image() else {
        debug!("Image notification without a ready image");
        return;
    };

    // `image` is released when it goes out of scope, whichever branch runs
    match nv21::convert(&image) {
        Ok(frame) => {
            counters.frames_delivered.fetch_add(1, Ordering::Relaxed);
            let mut callback = on_frame.lock().unwrap_or_else(PoisonError::into_inner);
            (*callback)(frame);
        }
        Err(e) => {
            counters.format_errors.fetch_add(1, Ordering::Relaxed);
            warn!(
                sequence = image.sequence,
                error = %e,
                "Dropping frame with malformed planes"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    struct FrontOnly;

    impl CameraProvider for FrontOnly {
        fn enumerate_cameras(&self) -> Vec<CameraDevice> {
            vec![CameraDevice {
                id: "0".into(),
                name: "Selfie".into(),
                facing: LensFacing::Front,
            }]
        }

        fn open(
            &self,
            _device: &CameraDevice,
            _request: &CaptureRequest,
            _on_image_available: ImageAvailableCallback,
        ) -> BackendResult<Box<dyn CaptureSession>> {
            panic!("open must not be called without a rear camera");
        }
    }

    struct OneShotSession {
        image: Mutex<Option<PlanarImage>>,
        released: Arc<AtomicU64>,
    }

    impl CaptureSession for OneShotSession {
        fn acquire_latest_image(&self) -> Option<CapturedImage> {
            let image = self.image.lock().unwrap().take()?;
            let released = Arc::clone(&self.released);
            Some(CapturedImage::new(image, move || {
                released.fetch_add(1, Ordering::SeqCst);
            }))
        }

        fn close(&self) {}
    }

    fn image(width: u32, height: u32) -> PlanarImage {
        let (w, h) = (width as usize, height as usize);
        PlanarImage {
            width,
            height,
            y: ImagePlane::packed(vec![1; w * h], w),
            u: ImagePlane::packed(vec![2; (w / 2) * (h / 2)], w / 2),
            v: ImagePlane::packed(vec![3; (w / 2) * (h / 2)], w / 2),
            sequence: 7,
            captured_at: Instant::now(),
        }
    }

    #[test]
    fn test_start_without_rear_camera_fails() {
        let mut source = FrameSource::new(Arc::new(FrontOnly), |_| {});
        assert_eq!(source.start(), Err(CameraError::NoSuitableDevice));
        assert!(!source.is_running());
    }

    /// Rear camera whose first open fails
    struct FlakyRear {
        opens: AtomicU64,
    }

    impl CameraProvider for FlakyRear {
        fn enumerate_cameras(&self) -> Vec<CameraDevice> {
            vec![CameraDevice {
                id: "1".into(),
                name: "Rear".into(),
                facing: LensFacing::Back,
            }]
        }

        fn open(
            &self,
            _device: &CameraDevice,
            _request: &CaptureRequest,
            _on_image_available: ImageAvailableCallback,
        ) -> BackendResult<Box<dyn CaptureSession>> {
            if self.opens.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(CameraError::DeviceUnavailable("busy".into()));
            }
            Ok(Box::new(OneShotSession {
                image: Mutex::new(None),
                released: Arc::new(AtomicU64::new(0)),
            }))
        }
    }

    #[test]
    fn test_failed_open_leaves_source_restartable() {
        let mut source = FrameSource::new(
            Arc::new(FlakyRear {
                opens: AtomicU64::new(0),
            }),
            |_| {},
        );

        assert_eq!(
            source.start(),
            Err(CameraError::DeviceUnavailable("busy".into()))
        );
        assert!(!source.is_running());
        assert!(source.active_device().is_none());

        assert_eq!(source.start(), Ok(()));
        assert!(source.is_running());
        assert_eq!(source.active_device().map(|d| d.id.as_str()), Some("1"));

        source.stop();
        source.stop();
        assert!(!source.is_running());
    }

    #[test]
    fn test_process_delivers_and_releases() {
        let released = Arc::new(AtomicU64::new(0));
        let session = OneShotSession {
            image: Mutex::new(Some(image(4, 2))),
            released: Arc::clone(&released),
        };
        let delivered = Arc::new(Mutex::new(Vec::new()));
        let delivered_clone = Arc::clone(&delivered);
        let callback: FrameCallback = Box::new(move |frame: SemiPlanarFrame| {
            delivered_clone.lock().unwrap().push(frame);
        });
        let on_frame = Mutex::new(callback);
        let counters = Counters::default();

        process_latest_image(&session, &on_frame, &counters);

        let frames = delivered.lock().unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].as_bytes(), &[1, 1, 1, 1, 1, 1, 1, 1, 3, 2, 3, 2]);
        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert_eq!(counters.frames_delivered.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_format_error_still_releases_image() {
        let released = Arc::new(AtomicU64::new(0));
        let session = OneShotSession {
            image: Mutex::new(Some(image(3, 2))),
            released: Arc::clone(&released),
        };
        let callback: FrameCallback = Box::new(|_| panic!("malformed frame must not be delivered"));
        let on_frame = Mutex::new(callback);
        let counters = Counters::default();

        process_latest_image(&session, &on_frame, &counters);

        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert_eq!(counters.format_errors.load(Ordering::SeqCst), 1);
        assert_eq!(counters.frames_delivered.load(Ordering::SeqCst), 0);
    }
}
