// SPDX-License-Identifier: GPL-3.0-only

//! Colour conversions for NV21 frames
//!
//! BT.601 full-range YUV to RGB, the same coefficients the preview path
//! has always used.

/// Convert NV21 (Y plane followed by interleaved V/U) to RGBA
///
/// `out` is resized to `width * height * 4`; alpha is always 255.
/// `data` must hold at least `width * height * 3 / 2` bytes.
pub fn nv21_to_rgba_into(data: &[u8], width: u32, height: u32, out: &mut Vec<u8>) {
    let w = width as usize;
    let h = height as usize;
    out.resize(w * h * 4, 0);

    let (luma, chroma) = data.split_at(w * h);

    for row in 0..h {
        let chroma_row = &chroma[(row / 2) * w..];
        let dst_row = &mut out[row * w * 4..(row + 1) * w * 4];

        for (col, px) in dst_row.chunks_exact_mut(4).enumerate() {
            let pair = (col / 2) * 2;
            let y = luma[row * w + col] as f32;
            let v = chroma_row[pair] as f32 - 128.0;
            let u = chroma_row[pair + 1] as f32 - 128.0;

            px[0] = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
            px[1] = (y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8;
            px[2] = (y + 1.772 * u).clamp(0.0, 255.0) as u8;
            px[3] = 255;
        }
    }
}

/// Convert NV21 to a freshly allocated RGBA buffer
pub fn nv21_to_rgba(data: &[u8], width: u32, height: u32) -> Vec<u8> {
    let mut out = Vec::new();
    nv21_to_rgba_into(data, width, height, &mut out);
    out
}

/// Luma (BT.601 weights) of an RGBA buffer, one byte per pixel
pub fn rgba_to_luma_into(rgba: &[u8], out: &mut Vec<u8>) {
    out.clear();
    out.extend(rgba.chunks_exact(4).map(|px| {
        let r = px[0] as f32;
        let g = px[1] as f32;
        let b = px[2] as f32;
        (0.299 * r + 0.587 * g + 0.114 * b).round().clamp(0.0, 255.0) as u8
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nv21(width: usize, height: usize, y: u8, v: u8, u: u8) -> Vec<u8> {
        let mut data = vec![y; width * height];
        for _ in 0..(width * height / 4) {
            data.push(v);
            data.push(u);
        }
        data
    }

    #[test]
    fn test_neutral_chroma_is_gray() {
        let rgba = nv21_to_rgba(&nv21(4, 2, 100, 128, 128), 4, 2);
        assert_eq!(rgba.len(), 32);
        for px in rgba.chunks_exact(4) {
            assert_eq!(px, &[100, 100, 100, 255]);
        }
    }

    #[test]
    fn test_v_drives_red_u_drives_blue() {
        // High V pushes red up; U neutral leaves blue at luma
        let rgba = nv21_to_rgba(&nv21(2, 2, 100, 200, 128), 2, 2);
        assert!(rgba[0] > 150);
        assert_eq!(rgba[2], 100);

        let rgba = nv21_to_rgba(&nv21(2, 2, 100, 128, 200), 2, 2);
        assert_eq!(rgba[0], 100);
        assert!(rgba[2] > 150);
    }

    #[test]
    fn test_chroma_shared_by_2x2_block() {
        // 4x2: left block neutral, right block strongly red
        let mut data = vec![128u8; 8];
        data.extend_from_slice(&[128, 128, 255, 128]);
        let rgba = nv21_to_rgba(&data, 4, 2);

        let red = |x: usize, y: usize| rgba[(y * 4 + x) * 4];
        assert_eq!(red(0, 0), red(1, 1));
        assert_eq!(red(2, 0), red(3, 1));
        assert!(red(2, 0) > red(0, 0));
    }

    #[test]
    fn test_luma_weights() {
        let mut out = Vec::new();
        rgba_to_luma_into(&[255, 255, 255, 255, 0, 0, 0, 255, 255, 0, 0, 255], &mut out);
        assert_eq!(out, vec![255, 0, 76]);
    }
}
