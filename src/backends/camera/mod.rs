// SPDX-License-Identifier: MPL-2.0

//! Camera backend abstraction
//!
//! Capture hardware is reached through two traits:
//!
//! ```text
//! ┌─────────────────────┐
//! │     FrameSource     │  ← Device selection, worker thread, conversion
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │  CameraProvider     │  ← Enumeration, open
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │   CaptureSession    │  ← Repeating capture, acquire-latest image pool
//! └─────────────────────┘
//! ```

pub mod frame_source;
pub mod types;

pub use frame_source::{FrameSource, FrameSourceStats};
pub use types::*;

use crate::errors::CameraError;

/// Capture device collaborator
pub trait CameraProvider: Send + Sync {
    /// Enumerate available cameras
    fn enumerate_cameras(&self) -> Vec<CameraDevice>;

    /// Open a device and start a repeating capture against a fixed image surface
    ///
    /// `on_image_available` is invoked on the device's own thread every time
    /// a new image lands in the pool. It must return quickly.
    ///
    /// # Returns
    /// * `Ok(session)` - Capture is running
    /// * `Err(CameraError::DeviceUnavailable)` - Open or permission failure
    fn open(
        &self,
        device: &CameraDevice,
        request: &CaptureRequest,
        on_image_available: ImageAvailableCallback,
    ) -> BackendResult<Box<dyn CaptureSession>>;
}

/// A running repeating capture
pub trait CaptureSession: Send + Sync {
    /// Take the most recent completed image, dropping any older pending ones
    ///
    /// Returns `None` when no image is ready or when every pool slot is
    /// held by images that have not been released yet.
    fn acquire_latest_image(&self) -> Option<CapturedImage>;

    /// Stop the repeating capture and close the device
    ///
    /// Safe to call more than once.
    fn close(&self);
}

/// Select the first device whose lens faces backwards
///
/// There is no interactive picker, so anything else is an error.
pub fn select_back_facing(devices: &[CameraDevice]) -> BackendResult<&CameraDevice> {
    devices
        .iter()
        .find(|device| device.facing == LensFacing::Back)
        .ok_or(CameraError::NoSuitableDevice)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(id: &str, facing: LensFacing) -> CameraDevice {
        CameraDevice {
            id: id.to_string(),
            name: format!("Camera {}", id),
            facing,
        }
    }

    #[test]
    fn test_selects_first_back_facing() {
        let devices = vec![
            device("0", LensFacing::Front),
            device("1", LensFacing::Back),
            device("2", LensFacing::Back),
        ];
        let selected = select_back_facing(&devices).unwrap();
        assert_eq!(selected.id, "1");
    }

    #[test]
    fn test_no_back_facing_device() {
        let devices = vec![
            device("0", LensFacing::Front),
            device("1", LensFacing::External),
        ];
        assert_eq!(
            select_back_facing(&devices),
            Err(CameraError::NoSuitableDevice)
        );
        assert_eq!(select_back_facing(&[]), Err(CameraError::NoSuitableDevice));
    }
}
