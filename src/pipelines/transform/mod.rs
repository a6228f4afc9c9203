// SPDX-License-Identifier: GPL-3.0-only

//! Per-frame transform stage
//!
//! A transform receives a tightly packed NV21 buffer and must return exactly
//! `width * height * 4` bytes of RGBA. What happens in between is up to the
//! implementation; [`apply_transform`] only enforces the output size.
//!
//! The mode flag is the user-facing processing toggle. [`NativeTransform`]
//! treats `true` as "edge detection" and `false` as plain colour conversion.

pub mod edges;
pub mod native;

pub use native::NativeTransform;

use crate::constants::rgba_len;
use crate::errors::TransformError;
use crate::media::formats::SemiPlanarFrame;

/// Synchronous per-frame transform
///
/// Runs on the capture worker thread, one call at a time, in capture order.
/// The input is only borrowed for the duration of the call.
pub trait FrameTransform: Send {
    fn transform(&mut self, pixels: &[u8], width: u32, height: u32, mode: bool) -> Vec<u8>;
}

impl<F> FrameTransform for F
where
    F: FnMut(&[u8], u32, u32, bool) -> Vec<u8> + Send,
{
    fn transform(&mut self, pixels: &[u8], width: u32, height: u32, mode: bool) -> Vec<u8> {
        self(pixels, width, height, mode)
    }
}

/// RGBA output of the transform stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformedFrame {
    pub width: u32,
    pub height: u32,
    /// RGBA, `width * height * 4` bytes
    pub pixels: Vec<u8>,
    /// Capture sequence number of the source frame
    pub sequence: u64,
}

/// Run `transform` on `frame` and check the output size
///
/// # Errors
/// [`TransformError::ContractViolation`] when the returned buffer is not
/// exactly `width * height * 4` bytes. The buffer is discarded, never
/// padded or truncated.
pub fn apply_transform(
    transform: &mut dyn FrameTransform,
    frame: &SemiPlanarFrame,
    mode: bool,
) -> Result<TransformedFrame, TransformError> {
    let (width, height) = (frame.width(), frame.height());
    let pixels = transform.transform(frame.as_bytes(), width, height, mode);

    let expected = rgba_len(width, height);
    if pixels.len() != expected {
        return Err(TransformError::ContractViolation {
            width,
            height,
            expected,
            actual: pixels.len(),
        });
    }

    Ok(TransformedFrame {
        width,
        height,
        pixels,
        sequence: frame.sequence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::{ImagePlane, PlanarImage};
    use crate::media::formats::convert_to_nv21;
    use std::time::Instant;

    fn frame(width: u32, height: u32) -> SemiPlanarFrame {
        let (w, h) = (width as usize, height as usize);
        convert_to_nv21(&PlanarImage {
            width,
            height,
            y: ImagePlane::packed(vec![16; w * h], w),
            u: ImagePlane::packed(vec![128; w * h / 4], w / 2),
            v: ImagePlane::packed(vec![128; w * h / 4], w / 2),
            sequence: 3,
            captured_at: Instant::now(),
        })
        .unwrap()
    }

    #[test]
    fn test_closure_transform_passes_arguments() {
        let mut seen = None;
        let mut transform = |pixels: &[u8], w: u32, h: u32, mode: bool| {
            seen = Some((pixels.len(), w, h, mode));
            vec![0u8; (w * h * 4) as usize]
        };

        let out = apply_transform(&mut transform, &frame(4, 2), true).unwrap();
        assert_eq!(out.pixels.len(), 32);
        assert_eq!((out.width, out.height, out.sequence), (4, 2, 3));
        assert_eq!(seen, Some((12, 4, 2, true)));
    }

    #[test]
    fn test_short_output_is_contract_violation() {
        let mut transform = |_: &[u8], w: u32, h: u32, _: bool| vec![0u8; (w * h * 3) as usize];
        let err = apply_transform(&mut transform, &frame(4, 2), false).unwrap_err();
        assert_eq!(
            err,
            TransformError::ContractViolation {
                width: 4,
                height: 2,
                expected: 32,
                actual: 24
            }
        );
    }

    #[test]
    fn test_long_output_is_contract_violation() {
        let mut transform = |_: &[u8], _: u32, _: u32, _: bool| vec![0u8; 33];
        assert!(matches!(
            apply_transform(&mut transform, &frame(4, 2), false),
            Err(TransformError::ContractViolation { actual: 33, .. })
        ));
    }
}
