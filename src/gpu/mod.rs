// SPDX-License-Identifier: GPL-3.0-only

//! GPU context abstraction
//!
//! The renderer talks to the GPU through [`GpuContext`], a small immediate
//! mode surface: textures, one shader program, viewport, clear, bind, draw
//! and readback. Two implementations exist:
//!
//! - [`WgpuContext`]: wgpu device rendering into an offscreen target
//! - [`SoftwareContext`]: CPU rasteriser with the same observable behaviour
//!
//! Contexts are created and used on the render thread only.

pub mod render_loop;
pub mod renderer;
pub mod software;
pub mod wgpu_context;

pub use render_loop::{RenderHandle, RenderLoop};
pub use renderer::{DrawOutcome, Renderer, RendererStats, TextureState};
pub use software::SoftwareContext;
pub use wgpu_context::WgpuContext;

use crate::errors::RenderError;
use std::sync::Arc;
use tracing::info;

/// Re-export of the wgpu crate used by the context
pub use wgpu;

/// Opaque texture handle issued by a context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

/// Opaque shader program handle issued by a context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(pub u32);

/// Sampling filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
    Nearest,
    #[default]
    Linear,
}

/// Texture coordinate wrapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WrapMode {
    #[default]
    ClampToEdge,
    Repeat,
}

/// Sampling parameters fixed at texture creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextureParams {
    pub min_filter: FilterMode,
    pub mag_filter: FilterMode,
    pub wrap: WrapMode,
}

/// Vertex of the full-screen quad
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct QuadVertex {
    /// Normalised device coordinates
    pub position: [f32; 2],
    /// Texture coordinates, origin at the top-left texel
    pub tex_coord: [f32; 2],
}

/// Framebuffer contents read back from a context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA rows, top row first
    pub pixels: Vec<u8>,
}

/// Immediate mode GPU collaborator
pub trait GpuContext {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Compile and link a program from vertex and fragment sources
    fn compile_program(
        &mut self,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<ProgramId, RenderError>;

    /// Create a texture object without storage
    fn create_texture(&mut self, params: TextureParams) -> Result<TextureId, RenderError>;

    /// (Re)allocate storage for `texture` and fill it with `rgba`
    fn allocate_texture(
        &mut self,
        texture: TextureId,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<(), RenderError>;

    /// Overwrite existing storage of the same dimensions in place
    fn update_texture(
        &mut self,
        texture: TextureId,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<(), RenderError>;

    /// Set the drawable area, recreating the target when its size changes
    fn set_viewport(&mut self, width: u32, height: u32) -> Result<(), RenderError>;

    /// Clear the target at the start of the next frame
    fn clear(&mut self, color: [f32; 4]);

    /// Bind `texture` to a texture unit for subsequent draws
    fn bind_texture(&mut self, unit: u32, texture: TextureId) -> Result<(), RenderError>;

    /// Draw a 4-vertex triangle strip with `program`
    fn draw_quad(&mut self, program: ProgramId, vertices: &[QuadVertex; 4])
    -> Result<(), RenderError>;

    /// Finish the frame, submitting any pending clear that was not drawn over
    fn finish_frame(&mut self) -> Result<(), RenderError>;

    /// Read the current target back as RGBA
    fn read_pixels(&mut self) -> Result<Snapshot, RenderError>;
}

impl<C: GpuContext + ?Sized> GpuContext for Box<C> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn compile_program(
        &mut self,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<ProgramId, RenderError> {
        (**self).compile_program(vertex_source, fragment_source)
    }

    fn create_texture(&mut self, params: TextureParams) -> Result<TextureId, RenderError> {
        (**self).create_texture(params)
    }

    fn allocate_texture(
        &mut self,
        texture: TextureId,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<(), RenderError> {
        (**self).allocate_texture(texture, width, height, rgba)
    }

    fn update_texture(
        &mut self,
        texture: TextureId,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<(), RenderError> {
        (**self).update_texture(texture, width, height, rgba)
    }

    fn set_viewport(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        (**self).set_viewport(width, height)
    }

    fn clear(&mut self, color: [f32; 4]) {
        (**self).clear(color)
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureId) -> Result<(), RenderError> {
        (**self).bind_texture(unit, texture)
    }

    fn draw_quad(
        &mut self,
        program: ProgramId,
        vertices: &[QuadVertex; 4],
    ) -> Result<(), RenderError> {
        (**self).draw_quad(program, vertices)
    }

    fn finish_frame(&mut self) -> Result<(), RenderError> {
        (**self).finish_frame()
    }

    fn read_pixels(&mut self) -> Result<Snapshot, RenderError> {
        (**self).read_pixels()
    }
}

/// Information about the created GPU device
#[derive(Debug, Clone)]
pub struct GpuDeviceInfo {
    /// Name of the GPU adapter
    pub adapter_name: String,
    /// Backend being used (Vulkan, Metal, DX12, etc.)
    pub backend: wgpu::Backend,
}

/// Create a wgpu device and queue for offscreen rendering
///
/// # Returns
///
/// A tuple of (Device, Queue, GpuDeviceInfo), or an error when no adapter
/// is available or the device cannot be created
pub async fn create_render_device(
    label: &str,
) -> Result<(Arc<wgpu::Device>, Arc<wgpu::Queue>, GpuDeviceInfo), RenderError> {
    info!(label = label, "Creating GPU device for rendering");

    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::VULKAN,
        ..Default::default()
    });

    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await
        .map_err(|e| RenderError::NoAdapter(e.to_string()))?;

    let adapter_info = adapter.get_info();
    let adapter_limits = adapter.limits();

    info!(
        adapter = %adapter_info.name,
        backend = ?adapter_info.backend,
        "GPU adapter selected for rendering"
    );

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some(label),
            required_features: wgpu::Features::empty(),
            required_limits: adapter_limits,
            memory_hints: wgpu::MemoryHints::Performance,
            ..Default::default()
        })
        .await
        .map_err(|e| RenderError::DeviceCreation(e.to_string()))?;

    let info = GpuDeviceInfo {
        adapter_name: adapter_info.name.clone(),
        backend: adapter_info.backend,
    };

    Ok((Arc::new(device), Arc::new(queue), info))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quad_vertex_layout() {
        assert_eq!(std::mem::size_of::<QuadVertex>(), 16);
        let quad = [QuadVertex {
            position: [-1.0, 1.0],
            tex_coord: [0.0, 0.0],
        }];
        let bytes: &[u8] = bytemuck::cast_slice(&quad);
        assert_eq!(bytes.len(), 16);
        assert_eq!(&bytes[4..8], &1.0f32.to_ne_bytes());
    }

    #[test]
    fn test_default_texture_params() {
        let params = TextureParams::default();
        assert_eq!(params.min_filter, FilterMode::Linear);
        assert_eq!(params.mag_filter, FilterMode::Linear);
        assert_eq!(params.wrap, WrapMode::ClampToEdge);
    }

    #[test]
    fn test_create_render_device() {
        // This test requires a GPU, so it may be skipped in CI
        match pollster::block_on(create_render_device("test_device")) {
            Ok((device, queue, info)) => {
                println!("Created device: {:?}", info);
                assert!(!info.adapter_name.is_empty());
                drop(queue);
                drop(device);
            }
            Err(e) => {
                println!("Skipping test (no GPU): {}", e);
            }
        }
    }
}
