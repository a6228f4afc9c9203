// SPDX-License-Identifier: GPL-3.0-only

//! CPU implementation of [`GpuContext`]
//!
//! Rasterises the preview quad into an in-memory RGBA target. Used when no
//! GPU adapter is available and by tests, which also inspect the recorded
//! allocation and upload history.

use super::{
    FilterMode, GpuContext, ProgramId, QuadVertex, Snapshot, TextureId, TextureParams, WrapMode,
};
use crate::constants::display::PREVIEW_TEXTURE_UNIT;
use crate::constants::rgba_len;
use crate::errors::RenderError;
use crate::shaders::{FRAGMENT_ENTRY_POINT, VERTEX_ENTRY_POINT};
use std::collections::HashMap;
use tracing::debug;

struct SoftTexture {
    params: TextureParams,
    width: u32,
    height: u32,
    data: Option<Vec<u8>>,
}

/// In-memory rasteriser
pub struct SoftwareContext {
    width: u32,
    height: u32,
    target: Vec<u8>,
    pending_clear: Option<[f32; 4]>,
    textures: HashMap<TextureId, SoftTexture>,
    programs: u32,
    bound: Option<TextureId>,
    allocations: Vec<(u32, u32)>,
    updates: u64,
    draws: u64,
}

impl SoftwareContext {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            target: vec![0; rgba_len(width, height)],
            pending_clear: None,
            textures: HashMap::new(),
            programs: 0,
            bound: None,
            allocations: Vec::new(),
            updates: 0,
            draws: 0,
        }
    }

    /// Dimensions of every storage allocation, oldest first
    pub fn allocations(&self) -> &[(u32, u32)] {
        &self.allocations
    }

    /// Number of in-place texture updates
    pub fn updates(&self) -> u64 {
        self.updates
    }

    /// Number of quads drawn
    pub fn draws(&self) -> u64 {
        self.draws
    }

    /// Current viewport dimensions
    pub fn viewport(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn texture_mut(&mut self, texture: TextureId) -> Result<&mut SoftTexture, RenderError> {
        self.textures
            .get_mut(&texture)
            .ok_or(RenderError::InvalidTexture)
    }

    fn apply_pending_clear(&mut self) {
        if let Some(color) = self.pending_clear.take() {
            let px = color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8);
            for dst in self.target.chunks_exact_mut(4) {
                dst.copy_from_slice(&px);
            }
        }
    }
}

fn check_upload(width: u32, height: u32, rgba: &[u8]) -> Result<(), RenderError> {
    let expected = rgba_len(width, height);
    if rgba.len() != expected {
        return Err(RenderError::UploadSize {
            expected,
            actual: rgba.len(),
        });
    }
    Ok(())
}

impl GpuContext for SoftwareContext {
    fn name(&self) -> &str {
        "software"
    }

    fn compile_program(
        &mut self,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<ProgramId, RenderError> {
        if !vertex_source.contains(VERTEX_ENTRY_POINT) {
            return Err(RenderError::Shader(format!(
                "vertex stage has no `{}` entry point",
                VERTEX_ENTRY_POINT
            )));
        }
        if !fragment_source.contains(FRAGMENT_ENTRY_POINT) {
            return Err(RenderError::Shader(format!(
                "fragment stage has no `{}` entry point",
                FRAGMENT_ENTRY_POINT
            )));
        }
        self.programs += 1;
        Ok(ProgramId(self.programs))
    }

    fn create_texture(&mut self, params: TextureParams) -> Result<TextureId, RenderError> {
        let id = TextureId(self.textures.len() as u32 + 1);
        self.textures.insert(
            id,
            SoftTexture {
                params,
                width: 0,
                height: 0,
                data: None,
            },
        );
        Ok(id)
    }

    fn allocate_texture(
        &mut self,
        texture: TextureId,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<(), RenderError> {
        check_upload(width, height, rgba)?;
        let tex = self.texture_mut(texture)?;
        tex.width = width;
        tex.height = height;
        tex.data = Some(rgba.to_vec());
        self.allocations.push((width, height));
        debug!(width, height, "Software texture allocated");
        Ok(())
    }

    fn update_texture(
        &mut self,
        texture: TextureId,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<(), RenderError> {
        check_upload(width, height, rgba)?;
        let tex = self.texture_mut(texture)?;
        match tex.data.as_mut() {
            Some(data) if tex.width == width && tex.height == height => {
                data.copy_from_slice(rgba);
            }
            _ => return Err(RenderError::InvalidTexture),
        }
        self.updates += 1;
        Ok(())
    }

    fn set_viewport(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        if (width, height) != (self.width, self.height) {
            self.width = width;
            self.height = height;
            self.target = vec![0; rgba_len(width, height)];
        }
        Ok(())
    }

    fn clear(&mut self, color: [f32; 4]) {
        self.pending_clear = Some(color);
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureId) -> Result<(), RenderError> {
        if unit != PREVIEW_TEXTURE_UNIT {
            return Err(RenderError::UnsupportedTextureUnit(unit));
        }
        if !self.textures.contains_key(&texture) {
            return Err(RenderError::InvalidTexture);
        }
        self.bound = Some(texture);
        Ok(())
    }

    fn draw_quad(
        &mut self,
        program: ProgramId,
        vertices: &[QuadVertex; 4],
    ) -> Result<(), RenderError> {
        if program.0 == 0 || program.0 > self.programs {
            return Err(RenderError::Shader(format!("unknown program {}", program.0)));
        }
        self.apply_pending_clear();

        let texture_id = self.bound.ok_or(RenderError::InvalidTexture)?;
        let tex = self
            .textures
            .get(&texture_id)
            .ok_or(RenderError::InvalidTexture)?;
        let data = tex.data.as_deref().ok_or(RenderError::InvalidTexture)?;

        let quad = QuadGeometry::from_strip(vertices);
        let (w, h) = (self.width as usize, self.height as usize);
        let filter = if tex.width > self.width || tex.height > self.height {
            tex.params.min_filter
        } else {
            tex.params.mag_filter
        };

        for py in 0..h {
            let ndc_y = 1.0 - (py as f32 + 0.5) / h as f32 * 2.0;
            for px in 0..w {
                let ndc_x = (px as f32 + 0.5) / w as f32 * 2.0 - 1.0;
                let Some([u, v]) = quad.tex_coord_at(ndc_x, ndc_y) else {
                    continue;
                };
                let color = sample(tex, data, filter, u, v);
                let idx = (py * w + px) * 4;
                self.target[idx..idx + 4].copy_from_slice(&color);
            }
        }

        self.draws += 1;
        Ok(())
    }

    fn finish_frame(&mut self) -> Result<(), RenderError> {
        self.apply_pending_clear();
        Ok(())
    }

    fn read_pixels(&mut self) -> Result<Snapshot, RenderError> {
        Ok(Snapshot {
            width: self.width,
            height: self.height,
            pixels: self.target.clone(),
        })
    }
}

/// Axis-aligned quad described by a 4-vertex triangle strip
struct QuadGeometry {
    min: [f32; 2],
    max: [f32; 2],
    /// Texture coordinates at (min x, min y), (max x, min y), (min x, max y), (max x, max y)
    corners: [[f32; 2]; 4],
}

impl QuadGeometry {
    fn from_strip(vertices: &[QuadVertex; 4]) -> Self {
        let mut min = [f32::MAX; 2];
        let mut max = [f32::MIN; 2];
        for v in vertices {
            for axis in 0..2 {
                min[axis] = min[axis].min(v.position[axis]);
                max[axis] = max[axis].max(v.position[axis]);
            }
        }

        let mut corners = [[0.0; 2]; 4];
        for v in vertices {
            let right = (v.position[0] - max[0]).abs() < (v.position[0] - min[0]).abs();
            let top = (v.position[1] - max[1]).abs() < (v.position[1] - min[1]).abs();
            corners[usize::from(right) + 2 * usize::from(top)] = v.tex_coord;
        }

        Self { min, max, corners }
    }

    fn tex_coord_at(&self, x: f32, y: f32) -> Option<[f32; 2]> {
        if x < self.min[0] || x > self.max[0] || y < self.min[1] || y > self.max[1] {
            return None;
        }
        let s = (x - self.min[0]) / (self.max[0] - self.min[0]);
        let t = (y - self.min[1]) / (self.max[1] - self.min[1]);

        let lerp = |a: [f32; 2], b: [f32; 2], f: f32| {
            [a[0] + (b[0] - a[0]) * f, a[1] + (b[1] - a[1]) * f]
        };
        let bottom = lerp(self.corners[0], self.corners[1], s);
        let top = lerp(self.corners[2], self.corners[3], s);
        Some(lerp(bottom, top, t))
    }
}

fn wrap_coord(i: isize, len: u32, mode: WrapMode) -> usize {
    let len = len as isize;
    match mode {
        WrapMode::ClampToEdge => i.clamp(0, len - 1) as usize,
        WrapMode::Repeat => i.rem_euclid(len) as usize,
    }
}

fn texel(tex: &SoftTexture, data: &[u8], x: isize, y: isize) -> [f32; 4] {
    let x = wrap_coord(x, tex.width, tex.params.wrap);
    let y = wrap_coord(y, tex.height, tex.params.wrap);
    let idx = (y * tex.width as usize + x) * 4;
    [
        data[idx] as f32,
        data[idx + 1] as f32,
        data[idx + 2] as f32,
        data[idx + 3] as f32,
    ]
}

fn sample(tex: &SoftTexture, data: &[u8], filter: FilterMode, u: f32, v: f32) -> [u8; 4] {
    let fx = u * tex.width as f32 - 0.5;
    let fy = v * tex.height as f32 - 0.5;

    let color = match filter {
        FilterMode::Nearest => texel(tex, data, fx.round() as isize, fy.round() as isize),
        FilterMode::Linear => {
            let x0 = fx.floor();
            let y0 = fy.floor();
            let ax = fx - x0;
            let ay = fy - y0;
            let (x0, y0) = (x0 as isize, y0 as isize);

            let c00 = texel(tex, data, x0, y0);
            let c10 = texel(tex, data, x0 + 1, y0);
            let c01 = texel(tex, data, x0, y0 + 1);
            let c11 = texel(tex, data, x0 + 1, y0 + 1);

            let mut out = [0.0; 4];
            for i in 0..4 {
                let top = c00[i] + (c10[i] - c00[i]) * ax;
                let bottom = c01[i] + (c11[i] - c01[i]) * ax;
                out[i] = top + (bottom - top) * ay;
            }
            out
        }
    };

    color.map(|c| c.round().clamp(0.0, 255.0) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::renderer::FULL_SCREEN_QUAD;
    use crate::shaders::{FRAGMENT_SHADER, VERTEX_SHADER};

    fn gradient(width: u32, height: u32) -> Vec<u8> {
        (0..width * height)
            .flat_map(|i| [(i % 256) as u8, (i / width) as u8, 7, 255])
            .collect()
    }

    #[test]
    fn test_draw_reproduces_texture_at_matching_size() {
        let mut ctx = SoftwareContext::new(8, 4);
        let program = ctx.compile_program(VERTEX_SHADER, FRAGMENT_SHADER).unwrap();
        let texture = ctx.create_texture(TextureParams::default()).unwrap();
        let pixels = gradient(8, 4);

        ctx.allocate_texture(texture, 8, 4, &pixels).unwrap();
        ctx.clear([0.0, 0.0, 0.0, 1.0]);
        ctx.bind_texture(0, texture).unwrap();
        ctx.draw_quad(program, &FULL_SCREEN_QUAD).unwrap();

        let snapshot = ctx.read_pixels().unwrap();
        assert_eq!((snapshot.width, snapshot.height), (8, 4));
        assert_eq!(snapshot.pixels, pixels);
        assert_eq!(ctx.draws(), 1);
    }

    #[test]
    fn test_clear_without_draw_is_applied_on_finish() {
        let mut ctx = SoftwareContext::new(2, 2);
        ctx.clear([1.0, 0.0, 0.0, 1.0]);
        ctx.finish_frame().unwrap();
        let snapshot = ctx.read_pixels().unwrap();
        assert!(snapshot.pixels.chunks_exact(4).all(|px| px == [255, 0, 0, 255]));
    }

    #[test]
    fn test_update_requires_matching_storage() {
        let mut ctx = SoftwareContext::new(2, 2);
        let texture = ctx.create_texture(TextureParams::default()).unwrap();
        assert_eq!(
            ctx.update_texture(texture, 2, 2, &[0; 16]),
            Err(RenderError::InvalidTexture)
        );

        ctx.allocate_texture(texture, 2, 2, &[0; 16]).unwrap();
        ctx.update_texture(texture, 2, 2, &[1; 16]).unwrap();
        assert_eq!(
            ctx.update_texture(texture, 4, 1, &[1; 16]),
            Err(RenderError::InvalidTexture)
        );
        assert_eq!(ctx.allocations(), &[(2, 2)]);
        assert_eq!(ctx.updates(), 1);
    }

    #[test]
    fn test_upload_size_is_checked() {
        let mut ctx = SoftwareContext::new(2, 2);
        let texture = ctx.create_texture(TextureParams::default()).unwrap();
        assert_eq!(
            ctx.allocate_texture(texture, 2, 2, &[0; 15]),
            Err(RenderError::UploadSize {
                expected: 16,
                actual: 15
            })
        );
    }

    #[test]
    fn test_only_unit_zero() {
        let mut ctx = SoftwareContext::new(2, 2);
        let texture = ctx.create_texture(TextureParams::default()).unwrap();
        assert_eq!(
            ctx.bind_texture(1, texture),
            Err(RenderError::UnsupportedTextureUnit(1))
        );
        assert_eq!(
            ctx.bind_texture(0, TextureId(99)),
            Err(RenderError::InvalidTexture)
        );
    }

    #[test]
    fn test_program_needs_entry_points() {
        let mut ctx = SoftwareContext::new(2, 2);
        assert!(matches!(
            ctx.compile_program("", FRAGMENT_SHADER),
            Err(RenderError::Shader(_))
        ));
        assert!(ctx.compile_program(VERTEX_SHADER, FRAGMENT_SHADER).is_ok());
    }

    #[test]
    fn test_linear_magnification_blends_neighbours() {
        let mut ctx = SoftwareContext::new(4, 1);
        let program = ctx.compile_program(VERTEX_SHADER, FRAGMENT_SHADER).unwrap();
        let texture = ctx.create_texture(TextureParams::default()).unwrap();
        ctx.allocate_texture(texture, 2, 1, &[0, 0, 0, 255, 200, 200, 200, 255])
            .unwrap();
        ctx.bind_texture(0, texture).unwrap();
        ctx.draw_quad(program, &FULL_SCREEN_QUAD).unwrap();

        let reds: Vec<u8> = ctx
            .read_pixels()
            .unwrap()
            .pixels
            .chunks_exact(4)
            .map(|px| px[0])
            .collect();
        assert_eq!(reds, vec![0, 50, 150, 200]);
    }
}
