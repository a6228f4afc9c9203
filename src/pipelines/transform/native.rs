// SPDX-License-Identifier: GPL-3.0-only

//! Built-in transform: colour conversion, optionally followed by edge detection

use super::FrameTransform;
use super::edges::EdgeDetector;
use crate::media::formats::conversions::{nv21_to_rgba_into, rgba_to_luma_into};
use tracing::debug;

/// NV21 to RGBA, or white-on-black Canny edges when `mode` is set
///
/// Intermediate buffers are cached and only reallocated when the frame
/// dimensions change.
#[derive(Debug, Clone, Default)]
pub struct NativeTransform {
    detector: EdgeDetector,
    dimensions: Option<(u32, u32)>,
    rgba: Vec<u8>,
    gray: Vec<u8>,
    edges: Vec<u8>,
}

impl NativeTransform {
    pub fn new() -> Self {
        Self::default()
    }

    fn prepare(&mut self, width: u32, height: u32) {
        if self.dimensions == Some((width, height)) {
            return;
        }
        debug!(width, height, "Resizing transform buffers");
        let len = width as usize * height as usize;
        self.rgba = Vec::with_capacity(len * 4);
        self.gray = Vec::with_capacity(len);
        self.edges = Vec::with_capacity(len);
        self.dimensions = Some((width, height));
    }
}

impl FrameTransform for NativeTransform {
    fn transform(&mut self, pixels: &[u8], width: u32, height: u32, mode: bool) -> Vec<u8> {
        self.prepare(width, height);
        nv21_to_rgba_into(pixels, width, height, &mut self.rgba);

        if !mode {
            return self.rgba.clone();
        }

        rgba_to_luma_into(&self.rgba, &mut self.gray);
        self.detector
            .detect(&self.gray, width as usize, height as usize, &mut self.edges);

        let mut out = Vec::with_capacity(self.edges.len() * 4);
        for &edge in &self.edges {
            out.extend_from_slice(&[edge, edge, edge, 255]);
        }
        out
    }
}
