// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Capture request defaults
///
/// The capture surface is fixed; it is not renegotiated per frame.
pub mod capture {
    /// Width of the capture surface in pixels
    pub const WIDTH: u32 = 640;

    /// Height of the capture surface in pixels
    pub const HEIGHT: u32 = 480;

    /// Number of images the device may have outstanding at once
    ///
    /// An image that is never released keeps its slot, so leaking two
    /// images stalls capture entirely.
    pub const MAX_IMAGES: usize = 2;

    /// Default frame rate of the synthetic test pattern source
    pub const TEST_PATTERN_FPS: u32 = 30;
}

/// RGBA output: one 4-byte pixel per source pixel
pub const RGBA_BYTES_PER_PIXEL: usize = 4;

/// Length of a semi-planar 4:2:0 buffer for the given dimensions
pub const fn semi_planar_len(width: u32, height: u32) -> usize {
    let w = width as usize;
    let h = height as usize;
    w * h + 2 * (w / 2) * (h / 2)
}

/// Length of an RGBA buffer for the given dimensions
pub const fn rgba_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * RGBA_BYTES_PER_PIXEL
}

/// Worker thread timing
pub mod timing {
    use super::Duration;

    /// How long worker loops block waiting for work before checking the stop flag
    pub const WORKER_POLL_INTERVAL: Duration = Duration::from_millis(100);

    /// Frames-per-second reporting window in milliseconds
    pub const FPS_WINDOW_MS: u64 = 1000;
}

/// Edge detection parameters used by the native transform
pub mod edges {
    /// Gaussian kernel size (taps per axis)
    pub const BLUR_KERNEL_SIZE: usize = 5;

    /// Gaussian sigma
    pub const BLUR_SIGMA: f32 = 1.4;

    /// Canny hysteresis low threshold (L1 gradient magnitude)
    pub const CANNY_LOW_THRESHOLD: i32 = 50;

    /// Canny hysteresis high threshold (L1 gradient magnitude)
    pub const CANNY_HIGH_THRESHOLD: i32 = 150;
}

/// Display defaults
pub mod display {
    /// Label reported to the stats observer
    pub const FPS_LABEL: &str = "FPS";

    /// Default offscreen viewport width
    pub const DEFAULT_VIEWPORT_WIDTH: u32 = 640;

    /// Default offscreen viewport height
    pub const DEFAULT_VIEWPORT_HEIGHT: u32 = 480;

    /// Texture unit the preview texture is bound to
    pub const PREVIEW_TEXTURE_UNIT: u32 = 0;
}
