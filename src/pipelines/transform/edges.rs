// SPDX-License-Identifier: GPL-3.0-only

//! Canny edge detection on 8-bit grayscale images
//!
//! Stages: separable Gaussian blur, Sobel gradients (L1 magnitude),
//! non-maximum suppression along the quantised gradient direction, then
//! double thresholding with hysteresis. Borders are replicated.

use crate::constants::edges::{
    BLUR_KERNEL_SIZE, BLUR_SIGMA, CANNY_HIGH_THRESHOLD, CANNY_LOW_THRESHOLD,
};

const EDGE: u8 = 255;
const WEAK: u8 = 1;

/// Reusable edge detector
///
/// Scratch buffers are kept between calls and only grow when the image
/// gets larger.
#[derive(Debug, Clone)]
pub struct EdgeDetector {
    kernel: Vec<f32>,
    low_threshold: f32,
    high_threshold: f32,
    scratch: Vec<f32>,
    blurred: Vec<f32>,
    magnitude: Vec<f32>,
    direction: Vec<u8>,
    stack: Vec<usize>,
}

impl Default for EdgeDetector {
    fn default() -> Self {
        Self::new(
            BLUR_KERNEL_SIZE,
            BLUR_SIGMA,
            CANNY_LOW_THRESHOLD as f32,
            CANNY_HIGH_THRESHOLD as f32,
        )
    }
}

impl EdgeDetector {
    pub fn new(kernel_size: usize, sigma: f32, low_threshold: f32, high_threshold: f32) -> Self {
        Self {
            kernel: gaussian_kernel(kernel_size, sigma),
            low_threshold,
            high_threshold,
            scratch: Vec::new(),
            blurred: Vec::new(),
            magnitude: Vec::new(),
            direction: Vec::new(),
            stack: Vec::new(),
        }
    }

    /// Detect edges in `gray` (`width * height` bytes)
    ///
    /// `edges` is resized to `width * height`; edge pixels are 255, the rest 0.
    pub fn detect(&mut self, gray: &[u8], width: usize, height: usize, edges: &mut Vec<u8>) {
        let len = width * height;
        edges.clear();
        edges.resize(len, 0);
        if len == 0 {
            return;
        }

        self.scratch.resize(len, 0.0);
        self.blurred.resize(len, 0.0);
        self.magnitude.resize(len, 0.0);
        self.direction.resize(len, 0);

        self.blur(gray, width, height);
        self.gradients(width, height);
        self.suppress_and_threshold(width, height, edges);
        self.hysteresis(width, height, edges);
    }

    fn blur(&mut self, gray: &[u8], width: usize, height: usize) {
        let radius = (self.kernel.len() / 2) as isize;

        for y in 0..height {
            for x in 0..width {
                let mut acc = 0.0;
                for (k, weight) in self.kernel.iter().enumerate() {
                    let sx = clamp_index(x as isize + k as isize - radius, width);
                    acc += weight * gray[y * width + sx] as f32;
                }
                self.scratch[y * width + x] = acc;
            }
        }

        for y in 0..height {
            for x in 0..width {
                let mut acc = 0.0;
                for (k, weight) in self.kernel.iter().enumerate() {
                    let sy = clamp_index(y as isize + k as isize - radius, height);
                    acc += weight * self.scratch[sy * width + x];
                }
                self.blurred[y * width + x] = acc;
            }
        }
    }

    fn gradients(&mut self, width: usize, height: usize) {
        let at = |x: isize, y: isize| -> f32 {
            self.blurred[clamp_index(y, height) * width + clamp_index(x, width)]
        };

        for y in 0..height as isize {
            for x in 0..width as isize {
                let gx = (at(x + 1, y - 1) + 2.0 * at(x + 1, y) + at(x + 1, y + 1))
                    - (at(x - 1, y - 1) + 2.0 * at(x - 1, y) + at(x - 1, y + 1));
                let gy = (at(x - 1, y + 1) + 2.0 * at(x, y + 1) + at(x + 1, y + 1))
                    - (at(x - 1, y - 1) + 2.0 * at(x, y - 1) + at(x + 1, y - 1));

                let idx = y as usize * width + x as usize;
                self.magnitude[idx] = gx.abs() + gy.abs();
                self.direction[idx] = quantise_direction(gx, gy);
            }
        }
    }

    fn suppress_and_threshold(&self, width: usize, height: usize, edges: &mut [u8]) {
        let mag = |x: isize, y: isize| -> f32 {
            if x < 0 || y < 0 || x >= width as isize || y >= height as isize {
                0.0
            } else {
                self.magnitude[y as usize * width + x as usize]
            }
        };

        for y in 0..height as isize {
            for x in 0..width as isize {
                let idx = y as usize * width + x as usize;
                let m = self.magnitude[idx];
                if m < self.low_threshold {
                    continue;
                }

                let (dx, dy) = match self.direction[idx] {
                    0 => (1, 0),
                    1 => (1, 1),
                    2 => (0, 1),
                    _ => (-1, 1),
                };
                if m < mag(x + dx, y + dy) || m < mag(x - dx, y - dy) {
                    continue;
                }

                edges[idx] = if m > self.high_threshold { EDGE } else { WEAK };
            }
        }
    }

    fn hysteresis(&mut self, width: usize, height: usize, edges: &mut [u8]) {
        self.stack.clear();
        self.stack
            .extend(edges.iter().enumerate().filter(|(_, e)| **e == EDGE).map(|(i, _)| i));

        while let Some(idx) = self.stack.pop() {
            let x = (idx % width) as isize;
            let y = (idx / width) as isize;
            for ny in y - 1..=y + 1 {
                for nx in x - 1..=x + 1 {
                    if nx < 0 || ny < 0 || nx >= width as isize || ny >= height as isize {
                        continue;
                    }
                    let n = ny as usize * width + nx as usize;
                    if edges[n] == WEAK {
                        edges[n] = EDGE;
                        self.stack.push(n);
                    }
                }
            }
        }

        for e in edges.iter_mut() {
            if *e != EDGE {
                *e = 0;
            }
        }
    }
}

/// Normalised 1-D Gaussian kernel
pub fn gaussian_kernel(size: usize, sigma: f32) -> Vec<f32> {
    let size = size.max(1) | 1;
    let radius = (size / 2) as f32;
    let mut kernel: Vec<f32> = (0..size)
        .map(|i| {
            let d = i as f32 - radius;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f32 = kernel.iter().sum();
    kernel.iter_mut().for_each(|w| *w /= sum);
    kernel
}

fn clamp_index(i: isize, len: usize) -> usize {
    i.clamp(0, len as isize - 1) as usize
}

/// 0: horizontal gradient, 1: 45°, 2: vertical, 3: 135°
fn quantise_direction(gx: f32, gy: f32) -> u8 {
    let mut angle = gy.atan2(gx).to_degrees();
    if angle < 0.0 {
        angle += 180.0;
    }
    match angle {
        a if !(22.5..157.5).contains(&a) => 0,
        a if a < 67.5 => 1,
        a if a < 112.5 => 2,
        _ => 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_is_normalised_and_symmetric() {
        let kernel = gaussian_kernel(5, 1.4);
        assert_eq!(kernel.len(), 5);
        assert!((kernel.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert!((kernel[0] - kernel[4]).abs() < 1e-6);
        assert!(kernel[2] > kernel[1] && kernel[1] > kernel[0]);
    }

    #[test]
    fn test_flat_image_has_no_edges() {
        let mut detector = EdgeDetector::default();
        let mut edges = Vec::new();
        detector.detect(&[90u8; 64], 8, 8, &mut edges);
        assert_eq!(edges.len(), 64);
        assert!(edges.iter().all(|e| *e == 0));
    }

    #[test]
    fn test_vertical_step_produces_vertical_edge() {
        let (w, h) = (16, 8);
        let gray: Vec<u8> = (0..w * h)
            .map(|i| if i % w < w / 2 { 0 } else { 255 })
            .collect();

        let mut detector = EdgeDetector::default();
        let mut edges = Vec::new();
        detector.detect(&gray, w, h, &mut edges);

        for y in 0..h {
            let row = &edges[y * w..(y + 1) * w];
            assert!(
                row[w / 2 - 1] == 255 || row[w / 2] == 255,
                "row {} has no edge at the step",
                y
            );
            assert_eq!(row[0], 0);
            assert_eq!(row[w - 1], 0);
        }
    }

    #[test]
    fn test_edges_are_binary() {
        let (w, h) = (12, 12);
        let gray: Vec<u8> = (0..w * h).map(|i| ((i * 37) % 256) as u8).collect();
        let mut detector = EdgeDetector::default();
        let mut edges = Vec::new();
        detector.detect(&gray, w, h, &mut edges);
        assert!(edges.iter().all(|e| *e == 0 || *e == 255));
    }

    #[test]
    fn test_direction_quantisation() {
        assert_eq!(quantise_direction(1.0, 0.0), 0);
        assert_eq!(quantise_direction(1.0, 1.0), 1);
        assert_eq!(quantise_direction(0.0, 1.0), 2);
        assert_eq!(quantise_direction(-1.0, 1.0), 3);
        assert_eq!(quantise_direction(-1.0, 0.0), 0);
    }
}
