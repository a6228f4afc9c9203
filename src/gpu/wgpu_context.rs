// SPDX-License-Identifier: GPL-3.0-only

//! wgpu implementation of [`GpuContext`]
//!
//! Renders into an offscreen `Rgba8Unorm` target sized to the viewport.
//! A clear is deferred until the next draw so that clear and draw share one
//! render pass; [`GpuContext::finish_frame`] flushes a clear with no draw.

use super::{
    FilterMode, GpuContext, ProgramId, QuadVertex, Snapshot, TextureId, TextureParams, WrapMode,
    create_render_device, wgpu,
};
use crate::constants::display::PREVIEW_TEXTURE_UNIT;
use crate::constants::rgba_len;
use crate::errors::RenderError;
use crate::shaders::{FRAGMENT_ENTRY_POINT, VERTEX_ENTRY_POINT};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

struct GpuTexture {
    sampler: wgpu::Sampler,
    storage: Option<TextureStorage>,
}

struct TextureStorage {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    width: u32,
    height: u32,
}

/// Offscreen wgpu renderer
pub struct WgpuContext {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    adapter_name: String,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    pipelines: Vec<wgpu::RenderPipeline>,
    vertex_buffer: wgpu::Buffer,
    textures: HashMap<TextureId, GpuTexture>,
    next_texture: u32,
    bound: Option<TextureId>,
    target: wgpu::Texture,
    width: u32,
    height: u32,
    pending_clear: Option<[f32; 4]>,
}

impl WgpuContext {
    /// Create a device and an offscreen target of the given size
    ///
    /// Blocks on device creation; call from the render thread.
    pub fn new(width: u32, height: u32) -> Result<Self, RenderError> {
        let (device, queue, info) = pollster::block_on(create_render_device("edgeview-render"))?;
        info!(
            adapter = %info.adapter_name,
            backend = ?info.backend,
            width,
            height,
            "wgpu context ready"
        );

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("preview_bind_group_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("preview_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let vertex_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("preview_quad_vertices"),
            size: std::mem::size_of::<[QuadVertex; 4]>() as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let target = create_target(&device, width, height);

        Ok(Self {
            device,
            queue,
            adapter_name: info.adapter_name,
            bind_group_layout,
            pipeline_layout,
            pipelines: Vec::new(),
            vertex_buffer,
            textures: HashMap::new(),
            next_texture: 1,
            bound: None,
            target,
            width,
            height,
            pending_clear: None,
        })
    }

    /// Name of the adapter the device was created on
    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    fn write_texture(&self, texture: &wgpu::Texture, width: u32, height: u32, rgba: &[u8]) {
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
    }

    /// Encode one render pass: pending clear (or load) plus an optional quad
    fn submit_pass(&mut self, draw: Option<(ProgramId, TextureId)>) -> Result<(), RenderError> {
        let load = match self.pending_clear.take() {
            Some([r, g, b, a]) => wgpu::LoadOp::Clear(wgpu::Color {
                r: r as f64,
                g: g as f64,
                b: b as f64,
                a: a as f64,
            }),
            None => wgpu::LoadOp::Load,
        };

        let draw = match draw {
            Some((program, texture)) => {
                let pipeline = self
                    .pipelines
                    .get(program.0 as usize)
                    .ok_or_else(|| RenderError::Shader(format!("unknown program {}", program.0)))?;
                let storage = self
                    .textures
                    .get(&texture)
                    .and_then(|t| t.storage.as_ref())
                    .ok_or(RenderError::InvalidTexture)?;
                Some((pipeline, &storage.bind_group))
            }
            None => None,
        };

        let view = self
            .target
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("preview_encoder"),
            });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("preview_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if let Some((pipeline, bind_group)) = draw {
                pass.set_pipeline(pipeline);
                pass.set_bind_group(0, bind_group, &[]);
                pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
                pass.draw(0..4, 0..1);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }
}

fn create_target(device: &wgpu::Device, width: u32, height: u32) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some("preview_target"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: TARGET_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    })
}

fn filter_mode(mode: FilterMode) -> wgpu::FilterMode {
    match mode {
        FilterMode::Nearest => wgpu::FilterMode::Nearest,
        FilterMode::Linear => wgpu::FilterMode::Linear,
    }
}

fn address_mode(mode: WrapMode) -> wgpu::AddressMode {
    match mode {
        WrapMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        WrapMode::Repeat => wgpu::AddressMode::Repeat,
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

impl GpuContext for WgpuContext {
    fn name(&self) -> &str {
        "wgpu"
    }

    fn compile_program(
        &mut self,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<ProgramId, RenderError> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let vertex = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("preview_vertex"),
                source: wgpu::ShaderSource::Wgsl(vertex_source.into()),
            });
        let fragment = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("preview_fragment"),
                source: wgpu::ShaderSource::Wgsl(fragment_source.into()),
            });

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("preview_pipeline"),
                layout: Some(&self.pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &vertex,
                    entry_point: Some(VERTEX_ENTRY_POINT),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<QuadVertex>() as u64,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2],
                    }],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &fragment,
                    entry_point: Some(FRAGMENT_ENTRY_POINT),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: TARGET_FORMAT,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleStrip,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });

        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(RenderError::Shader(error.to_string()));
        }

        self.pipelines.push(pipeline);
        Ok(ProgramId(self.pipelines.len() as u32 - 1))
    }

    fn create_texture(&mut self, params: TextureParams) -> Result<TextureId, RenderError> {
        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("preview_sampler"),
            address_mode_u: address_mode(params.wrap),
            address_mode_v: address_mode(params.wrap),
            address_mode_w: address_mode(params.wrap),
            mag_filter: filter_mode(params.mag_filter),
            min_filter: filter_mode(params.min_filter),
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let id = TextureId(self.next_texture);
        self.next_texture += 1;
        self.textures.insert(
            id,
            GpuTexture {
                sampler,
                storage: None,
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
        let entry = self.textures.get(&texture).ok_or(RenderError::InvalidTexture)?;

        let gpu_texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("preview_texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = gpu_texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("preview_bind_group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&entry.sampler),
                },
            ],
        });

        self.write_texture(&gpu_texture, width, height, rgba);
        debug!(width, height, "GPU texture allocated");

        if let Some(entry) = self.textures.get_mut(&texture) {
            entry.storage = Some(TextureStorage {
                texture: gpu_texture,
                bind_group,
                width,
                height,
            });
        }
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
        let storage = self
            .textures
            .get(&texture)
            .and_then(|t| t.storage.as_ref())
            .filter(|s| s.width == width && s.height == height)
            .ok_or(RenderError::InvalidTexture)?;
        self.write_texture(&storage.texture, width, height, rgba);
        Ok(())
    }

    fn set_viewport(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        if (width, height) != (self.width, self.height) {
            debug!(width, height, "Recreating offscreen target");
            self.target = create_target(&self.device, width, height);
            self.width = width;
            self.height = height;
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
        let texture = self.bound.ok_or(RenderError::InvalidTexture)?;
        self.queue
            .write_buffer(&self.vertex_buffer, 0, bytemuck::cast_slice(vertices));
        self.submit_pass(Some((program, texture)))
    }

    fn finish_frame(&mut self) -> Result<(), RenderError> {
        if self.pending_clear.is_some() {
            self.submit_pass(None)?;
        }
        Ok(())
    }

    fn read_pixels(&mut self) -> Result<Snapshot, RenderError> {
        let (width, height) = (self.width.max(1), self.height.max(1));
        let padded_bytes_per_row = (width * 4 + 255) & !255; // Align to 256 bytes

        let staging_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("preview_readback_staging"),
            size: (padded_bytes_per_row * height) as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("preview_readback_encoder"),
            });

        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.target,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging_buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );

        self.queue.submit(std::iter::once(encoder.finish()));

        let buffer_slice = staging_buffer.slice(..);
        let (sender, receiver) = futures::channel::oneshot::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });

        let _ = self.device.poll(wgpu::PollType::wait_indefinitely());

        pollster::block_on(receiver)
            .map_err(|_| RenderError::Readback("mapping callback dropped".to_string()))?
            .map_err(|e| RenderError::Readback(format!("{:?}", e)))?;

        // Strip row padding
        let data = buffer_slice.get_mapped_range();
        let row_bytes = (width * 4) as usize;
        let mut pixels = Vec::with_capacity(row_bytes * height as usize);
        for row in 0..height as usize {
            let start = row * padded_bytes_per_row as usize;
            pixels.extend_from_slice(&data[start..start + row_bytes]);
        }

        drop(data);
        staging_buffer.unmap();

        Ok(Snapshot {
            width,
            height,
            pixels,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::renderer::FULL_SCREEN_QUAD;
    use crate::shaders::{FRAGMENT_SHADER, VERTEX_SHADER};

    #[test]
    fn test_offscreen_draw_round_trip() {
        // This test requires a GPU, so it may be skipped in CI
        let mut ctx = match WgpuContext::new(4, 2) {
            Ok(ctx) => ctx,
            Err(e) => {
                println!("Skipping test (no GPU): {}", e);
                return;
            }
        };

        let program = ctx.compile_program(VERTEX_SHADER, FRAGMENT_SHADER).unwrap();
        let texture = ctx
            .create_texture(TextureParams {
                min_filter: FilterMode::Nearest,
                mag_filter: FilterMode::Nearest,
                wrap: WrapMode::ClampToEdge,
            })
            .unwrap();
        let pixels: Vec<u8> = (0..8u8).flat_map(|i| [i * 30, 255 - i * 30, 0, 255]).collect();

        ctx.allocate_texture(texture, 4, 2, &pixels).unwrap();
        ctx.clear([0.0, 0.0, 0.0, 1.0]);
        ctx.bind_texture(0, texture).unwrap();
        ctx.draw_quad(program, &FULL_SCREEN_QUAD).unwrap();
        ctx.finish_frame().unwrap();

        let snapshot = ctx.read_pixels().unwrap();
        assert_eq!((snapshot.width, snapshot.height), (4, 2));
        assert_eq!(snapshot.pixels, pixels);
    }

    #[test]
    fn test_invalid_program_is_reported() {
        let mut ctx = match WgpuContext::new(2, 2) {
            Ok(ctx) => ctx,
            Err(e) => {
                println!("Skipping test (no GPU): {}", e);
                return;
            }
        };
        assert!(matches!(
            ctx.compile_program("not wgsl", FRAGMENT_SHADER),
            Err(RenderError::Shader(_))
        ));
    }
}
