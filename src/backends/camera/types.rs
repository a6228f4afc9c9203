// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends

use crate::constants::capture;
use crate::errors::CameraError;
use std::time::Instant;

/// Direction a camera lens faces relative to the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LensFacing {
    /// Same side as the display (selfie camera)
    Front,
    /// Opposite side from the display
    Back,
    /// Removable or external device
    External,
}

impl std::fmt::Display for LensFacing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LensFacing::Front => write!(f, "front"),
            LensFacing::Back => write!(f, "back"),
            LensFacing::External => write!(f, "external"),
        }
    }
}

/// Represents a camera device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraDevice {
    /// Identifier used to open the device
    pub id: String,
    /// Human readable name
    pub name: String,
    /// Lens facing characteristic
    pub facing: LensFacing,
}

/// Autofocus mode requested for the repeating capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AfMode {
    Off,
    Auto,
    /// Continuous autofocus tuned for stills-quality preview
    #[default]
    ContinuousPicture,
}

/// Auto exposure mode requested for the repeating capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AeMode {
    Off,
    #[default]
    On,
}

/// Repeating capture request configuration
///
/// These are capture hints fixed at session creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureRequest {
    pub width: u32,
    pub height: u32,
    pub af_mode: AfMode,
    pub ae_mode: AeMode,
    /// Size of the device-side image pool
    pub max_images: usize,
}

impl CaptureRequest {
    /// Fixed 640x480 preview request with continuous AF and AE on
    pub fn preview() -> Self {
        Self {
            width: capture::WIDTH,
            height: capture::HEIGHT,
            af_mode: AfMode::ContinuousPicture,
            ae_mode: AeMode::On,
            max_images: capture::MAX_IMAGES,
        }
    }
}

impl Default for CaptureRequest {
    fn default() -> Self {
        Self::preview()
    }
}

impl std::fmt::Display for CaptureRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}x{} YUV420 (AF {:?}, AE {:?}, {} images)",
            self.width, self.height, self.af_mode, self.ae_mode, self.max_images
        )
    }
}

/// One plane of a planar YUV image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePlane {
    pub data: Vec<u8>,
    /// Bytes per row, including any padding
    pub row_stride: usize,
    /// Byte step between consecutive samples within a row
    pub pixel_stride: usize,
}

impl ImagePlane {
    pub fn new(data: Vec<u8>, row_stride: usize, pixel_stride: usize) -> Self {
        Self {
            data,
            row_stride,
            pixel_stride,
        }
    }

    /// Tightly packed plane: row stride equals width, pixel stride 1
    pub fn packed(data: Vec<u8>, width: usize) -> Self {
        Self::new(data, width, 1)
    }
}

/// A single planar YUV 4:2:0 capture result
#[derive(Debug, Clone)]
pub struct PlanarImage {
    pub width: u32,
    pub height: u32,
    pub y: ImagePlane,
    pub u: ImagePlane,
    pub v: ImagePlane,
    /// Monotonic sequence number assigned by the device
    pub sequence: u64,
    /// When the exposure completed
    pub captured_at: Instant,
}

/// Image acquired from a capture session
///
/// Holds one slot of the device's bounded image pool. The slot is returned
/// when this value is dropped, on every exit path of the caller.
pub struct CapturedImage {
    image: PlanarImage,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl CapturedImage {
    /// Wrap an image together with the callback that returns it to the pool
    pub fn new(image: PlanarImage, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            image,
            release: Some(Box::new(release)),
        }
    }

    pub fn image(&self) -> &PlanarImage {
        &self.image
    }
}

impl std::ops::Deref for CapturedImage {
    type Target = PlanarImage;

    fn deref(&self) -> &PlanarImage {
        &self.image
    }
}

impl std::fmt::Debug for CapturedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapturedImage")
            .field("width", &self.image.width)
            .field("height", &self.image.height)
            .field("sequence", &self.image.sequence)
            .finish()
    }
}

impl Drop for CapturedImage {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

/// Callback fired on the device's own thread whenever a new image is ready
pub type ImageAvailableCallback = std::sync::Arc<dyn Fn() + Send + Sync>;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, CameraError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn tiny_image() -> PlanarImage {
        PlanarImage {
            width: 2,
            height: 2,
            y: ImagePlane::packed(vec![0; 4], 2),
            u: ImagePlane::packed(vec![0; 1], 1),
            v: ImagePlane::packed(vec![0; 1], 1),
            sequence: 0,
            captured_at: Instant::now(),
        }
    }

    #[test]
    fn test_preview_request_defaults() {
        let request = CaptureRequest::preview();
        assert_eq!((request.width, request.height), (640, 480));
        assert_eq!(request.af_mode, AfMode::ContinuousPicture);
        assert_eq!(request.ae_mode, AeMode::On);
        assert_eq!(request.max_images, 2);
    }

    #[test]
    fn test_captured_image_releases_on_drop() {
        let released = Arc::new(AtomicUsize::new(0));
        let released_clone = Arc::clone(&released);

        let image = CapturedImage::new(tiny_image(), move || {
            released_clone.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(image.width, 2);
        assert_eq!(released.load(Ordering::SeqCst), 0);

        drop(image);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_captured_image_releases_during_unwind() {
        let released = Arc::new(AtomicUsize::new(0));
        let released_clone = Arc::clone(&released);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _image = CapturedImage::new(tiny_image(), move || {
                released_clone.fetch_add(1, Ordering::SeqCst);
            });
            panic!("processing failed");
        }));

        assert!(result.is_err());
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }
}
