// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic planar YUV 4:2:0 frames
//!
//! A diagonal luma ramp with a vertical bar that moves one step per frame,
//! over a slowly cycling chroma tint. The bar gives edge detection
//! something to find.

use crate::backends::camera::types::{ImagePlane, PlanarImage};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Bytes of padding added to each row in the interleaved layout
const ROW_PADDING: usize = 16;

/// Width of the moving bar in pixels
const BAR_WIDTH: usize = 32;

/// How the chroma planes are laid out in memory
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChromaLayout {
    /// Three separate tightly packed planes, pixel stride 1
    #[default]
    Planar,
    /// U and V alias one interleaved VU buffer, pixel stride 2, padded rows
    Interleaved,
}

impl std::fmt::Display for ChromaLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChromaLayout::Planar => write!(f, "planar"),
            ChromaLayout::Interleaved => write!(f, "interleaved"),
        }
    }
}

/// Luma of pixel (x, y) in frame `sequence`
fn luma_at(x: usize, y: usize, width: usize, sequence: u64) -> u8 {
    let bar_start = (sequence as usize * 4) % width.max(1);
    let in_bar = x >= bar_start && x < bar_start + BAR_WIDTH;
    if in_bar {
        235
    } else {
        (16 + (x + y) % 128) as u8
    }
}

fn chroma_at(sequence: u64) -> (u8, u8) {
    let phase = (sequence % 64) as u8;
    (112 + phase / 2, 144 - phase / 2)
}

/// Render frame `sequence` of the pattern
pub fn generate(width: u32, height: u32, sequence: u64, layout: ChromaLayout) -> PlanarImage {
    let w = width as usize;
    let h = height as usize;
    let (cw, ch) = (w / 2, h / 2);
    let (u_value, v_value) = chroma_at(sequence);

    let (y, u, v) = match layout {
        ChromaLayout::Planar => {
            let mut luma = Vec::with_capacity(w * h);
            for row in 0..h {
                luma.extend((0..w).map(|col| luma_at(col, row, w, sequence)));
            }
            (
                ImagePlane::packed(luma, w),
                ImagePlane::packed(vec![u_value; cw * ch], cw),
                ImagePlane::packed(vec![v_value; cw * ch], cw),
            )
        }
        ChromaLayout::Interleaved => {
            let y_stride = w + ROW_PADDING;
            let mut luma = vec![0u8; y_stride * h];
            for row in 0..h {
                for col in 0..w {
                    luma[row * y_stride + col] = luma_at(col, row, w, sequence);
                }
            }

            let c_stride = cw * 2 + ROW_PADDING;
            let mut vu = vec![0u8; c_stride * ch + 1];
            for row in 0..ch {
                for col in 0..cw {
                    vu[row * c_stride + col * 2] = v_value;
                    vu[row * c_stride + col * 2 + 1] = u_value;
                }
            }
            // The U view starts one byte into the shared buffer
            let u_view = vu[1..].to_vec();
            vu.truncate(c_stride * ch);

            (
                ImagePlane::new(luma, y_stride, 1),
                ImagePlane::new(u_view, c_stride, 2),
                ImagePlane::new(vu, c_stride, 2),
            )
        }
    };

    PlanarImage {
        width,
        height,
        y,
        u,
        v,
        sequence,
        captured_at: Instant::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::formats::convert_to_nv21;

    #[test]
    fn test_layouts_convert_to_identical_nv21() {
        for sequence in [0, 5, 63] {
            let planar = convert_to_nv21(&generate(64, 32, sequence, ChromaLayout::Planar)).unwrap();
            let interleaved =
                convert_to_nv21(&generate(64, 32, sequence, ChromaLayout::Interleaved)).unwrap();
            assert_eq!(planar.as_bytes(), interleaved.as_bytes());
        }
    }

    #[test]
    fn test_interleaved_strides() {
        let image = generate(8, 4, 0, ChromaLayout::Interleaved);
        assert_eq!(image.y.row_stride, 8 + ROW_PADDING);
        assert_eq!(image.u.pixel_stride, 2);
        assert_eq!(image.v.pixel_stride, 2);
        assert_eq!(image.u.row_stride, image.v.row_stride);
        assert!(image.u.data.len() >= image.u.row_stride * 2);
    }

    #[test]
    fn test_bar_moves_between_frames() {
        let a = generate(64, 2, 0, ChromaLayout::Planar);
        let b = generate(64, 2, 1, ChromaLayout::Planar);
        assert_ne!(a.y.data, b.y.data);
        assert_eq!(a.y.data[0], 235);
        assert_eq!(b.y.data[4], 235);
    }

    #[test]
    fn test_chroma_order_survives_conversion() {
        let frame = convert_to_nv21(&generate(4, 2, 0, ChromaLayout::Interleaved)).unwrap();
        let (u, v) = chroma_at(0);
        assert_eq!(frame.vu_plane(), &[v, u, v, u]);
    }
}
