// SPDX-License-Identifier: GPL-3.0-only

//! Planar YUV 4:2:0 to NV21 repacking
//!
//! NV21 layout for a `width x height` frame:
//!
//! ```text
//! ┌──────────────────────────────┐
//! │ Y  (width * height bytes)     │  row-major, no padding
//! ├──────────────────────────────┤
//! │ V U V U ... (width/2 pairs)   │  one V/U pair per 2x2 luma block,
//! │ ...        (height/2 rows)    │  row-major over the half-res grid
//! └──────────────────────────────┘
//! ```
//!
//! Input planes may carry arbitrary row padding and a chroma pixel stride
//! of 1 (fully planar) or 2 (the planes alias an interleaved buffer).
//! V is written before U; downstream colour conversion depends on it.

use crate::backends::camera::types::{ImagePlane, PlanarImage};
use crate::constants::semi_planar_len;
use crate::errors::{FormatError, Plane};

/// Owned NV21 frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemiPlanarFrame {
    width: u32,
    height: u32,
    data: Vec<u8>,
    /// Capture sequence number carried through from the device
    pub sequence: u64,
}

impl SemiPlanarFrame {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Whole buffer, Y followed by interleaved VU
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Luma plane
    pub fn y_plane(&self) -> &[u8] {
        &self.data[..self.luma_len()]
    }

    /// Interleaved V/U tail
    pub fn vu_plane(&self) -> &[u8] {
        &self.data[self.luma_len()..]
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    fn luma_len(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Repack a planar 4:2:0 image into NV21
///
/// # Errors
/// Returns [`FormatError`] for odd or zero dimensions, unusable strides,
/// U/V strides that differ, or a plane buffer shorter than
/// `row_stride * rows`.
pub fn convert(image: &PlanarImage) -> Result<SemiPlanarFrame, FormatError> {
    let (width, height) = (image.width, image.height);
    validate(image)?;

    let w = width as usize;
    let h = height as usize;
    let mut out = vec![0u8; semi_planar_len(width, height)];

    let (luma, chroma) = out.split_at_mut(w * h);
    copy_luma(&image.y, w, h, luma);
    interleave_vu(&image.v, &image.u, w / 2, h / 2, chroma);

    Ok(SemiPlanarFrame {
        width,
        height,
        data: out,
        sequence: image.sequence,
    })
}

fn validate(image: &PlanarImage) -> Result<(), FormatError> {
    let (width, height) = (image.width, image.height);
    if width == 0 || height == 0 {
        return Err(FormatError::EmptyFrame);
    }
    if width % 2 != 0 || height % 2 != 0 {
        return Err(FormatError::OddDimensions { width, height });
    }

    let w = width as usize;
    let h = height as usize;

    check_strides(Plane::Y, &image.y, w)?;
    check_strides(Plane::V, &image.v, w / 2)?;
    if image.u.row_stride != image.v.row_stride || image.u.pixel_stride != image.v.pixel_stride {
        return Err(FormatError::MismatchedChromaStrides);
    }

    check_len(Plane::Y, &image.y, h)?;
    check_len(Plane::U, &image.u, h / 2)?;
    check_len(Plane::V, &image.v, h / 2)?;
    Ok(())
}

/// Row stride must cover `samples` samples at the plane's pixel stride
fn check_strides(plane: Plane, data: &ImagePlane, samples: usize) -> Result<(), FormatError> {
    let row_span = (samples - 1)
        .checked_mul(data.pixel_stride)
        .and_then(|span| span.checked_add(1));
    let fits = row_span.is_some_and(|span| data.row_stride >= span);
    if data.pixel_stride == 0 || !fits || data.row_stride < samples {
        return Err(FormatError::InvalidStride {
            plane,
            row_stride: data.row_stride,
            pixel_stride: data.pixel_stride,
        });
    }
    Ok(())
}

fn check_len(plane: Plane, data: &ImagePlane, rows: usize) -> Result<(), FormatError> {
    // An overflowing requirement can never be met
    let required = data.row_stride.checked_mul(rows).unwrap_or(usize::MAX);
    if data.data.len() < required {
        return Err(FormatError::PlaneTooShort {
            plane,
            len: data.data.len(),
            required,
        });
    }
    Ok(())
}

fn copy_luma(y: &ImagePlane, width: usize, height: usize, out: &mut [u8]) {
    for (row, dst) in out.chunks_exact_mut(width).take(height).enumerate() {
        let start = row * y.row_stride;
        if y.pixel_stride == 1 {
            dst.copy_from_slice(&y.data[start..start + width]);
        } else {
            for (col, px) in dst.iter_mut().enumerate() {
                *px = y.data[start + col * y.pixel_stride];
            }
        }
    }
}

fn interleave_vu(
    v: &ImagePlane,
    u: &ImagePlane,
    chroma_width: usize,
    chroma_height: usize,
    out: &mut [u8],
) {
    // U shares V's strides (checked in `validate`)
    let row_stride = v.row_stride;
    let pixel_stride = v.pixel_stride;

    for (row, dst) in out
        .chunks_exact_mut(chroma_width * 2)
        .take(chroma_height)
        .enumerate()
    {
        for (col, pair) in dst.chunks_exact_mut(2).enumerate() {
            let pos = col * pixel_stride + row * row_stride;
            pair[0] = v.data[pos];
            pair[1] = u.data[pos];
        }
    }
}
