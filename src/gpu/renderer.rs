// SPDX-License-Identifier: GPL-3.0-only

//! Preview renderer
//!
//! Owns the preview texture and the quad program. Each draw drains the
//! pending slot, uploads the frame if there is one, then redraws the
//! full-screen quad. Storage is reallocated only when the frame size
//! changes; same-size frames are written in place.

use super::{GpuContext, ProgramId, QuadVertex, Snapshot, TextureId, TextureParams};
use crate::constants::display::PREVIEW_TEXTURE_UNIT;
use crate::errors::RenderError;
use crate::pipelines::slot::PendingFrameSlot;
use crate::shaders::{FRAGMENT_SHADER, VERTEX_SHADER};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Full-screen quad as a triangle strip
///
/// Positions span NDC; texture coordinates are flipped vertically so the
/// first row of the frame lands at the top of the target.
pub const FULL_SCREEN_QUAD: [QuadVertex; 4] = [
    QuadVertex {
        position: [-1.0, -1.0],
        tex_coord: [0.0, 1.0],
    },
    QuadVertex {
        position: [1.0, -1.0],
        tex_coord: [1.0, 1.0],
    },
    QuadVertex {
        position: [-1.0, 1.0],
        tex_coord: [0.0, 0.0],
    },
    QuadVertex {
        position: [1.0, 1.0],
        tex_coord: [1.0, 0.0],
    },
];

const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Storage state of the preview texture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureState {
    Unallocated,
    Allocated { width: u32, height: u32 },
}

/// What a single draw did with the pending slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawOutcome {
    /// Texture storage was (re)allocated for a new frame size
    Allocated { width: u32, height: u32 },
    /// Existing storage was updated in place
    Updated,
    /// Nothing pending; the existing texture was redrawn
    Redrawn,
    /// Nothing pending and nothing ever uploaded; target only cleared
    Cleared,
}

/// Renderer counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RendererStats {
    pub allocations: u64,
    pub updates: u64,
    pub draws: u64,
    /// Sequence number of the last uploaded frame
    pub last_sequence: Option<u64>,
}

/// Draws the latest transformed frame as a full-screen quad
pub struct Renderer<C: GpuContext = Box<dyn GpuContext>> {
    ctx: C,
    program: ProgramId,
    texture: TextureId,
    state: TextureState,
    viewport: (u32, u32),
    stats: RendererStats,
}

impl<C: GpuContext> Renderer<C> {
    /// Compile the quad program and create the (empty) preview texture
    pub fn new(mut ctx: C) -> Result<Self, RenderError> {
        let program = ctx.compile_program(VERTEX_SHADER, FRAGMENT_SHADER)?;
        let texture = ctx.create_texture(TextureParams::default())?;
        info!(context = ctx.name(), "Renderer initialized");

        Ok(Self {
            ctx,
            program,
            texture,
            state: TextureState::Unallocated,
            viewport: (0, 0),
            stats: RendererStats::default(),
        })
    }

    /// Record the new surface size
    ///
    /// The preview texture keeps its storage; only the target changes.
    pub fn surface_changed(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        debug!(width, height, "Surface changed");
        self.viewport = (width, height);
        self.ctx.set_viewport(width, height)
    }

    /// Drain `slot`, upload what it held and redraw
    pub fn draw_frame(&mut self, slot: &PendingFrameSlot) -> Result<DrawOutcome, RenderError> {
        let mut outcome = None;

        if let Some(frame) = slot.drain_and_take() {
            let needs_allocation = match self.state {
                TextureState::Allocated { width, height } => {
                    width != frame.width || height != frame.height
                }
                TextureState::Unallocated => true,
            };

            if needs_allocation {
                let start = Instant::now();
                self.ctx
                    .allocate_texture(self.texture, frame.width, frame.height, &frame.pixels)?;
                self.state = TextureState::Allocated {
                    width: frame.width,
                    height: frame.height,
                };
                self.stats.allocations += 1;

                let elapsed = start.elapsed();
                if elapsed.as_millis() > 5 {
                    warn!(
                        alloc_ms = elapsed.as_millis(),
                        width = frame.width,
                        height = frame.height,
                        "Texture allocation took significant time - may cause stutter"
                    );
                }
                outcome = Some(DrawOutcome::Allocated {
                    width: frame.width,
                    height: frame.height,
                });
            } else {
                self.ctx
                    .update_texture(self.texture, frame.width, frame.height, &frame.pixels)?;
                self.stats.updates += 1;
                outcome = Some(DrawOutcome::Updated);
            }
            self.stats.last_sequence = Some(frame.sequence);
        }

        self.ctx.clear(CLEAR_COLOR);

        let outcome = match self.state {
            TextureState::Allocated { .. } => {
                self.ctx.bind_texture(PREVIEW_TEXTURE_UNIT, self.texture)?;
                self.ctx.draw_quad(self.program, &FULL_SCREEN_QUAD)?;
                self.stats.draws += 1;
                outcome.unwrap_or(DrawOutcome::Redrawn)
            }
            TextureState::Unallocated => DrawOutcome::Cleared,
        };

        self.ctx.finish_frame()?;
        Ok(outcome)
    }

    /// Read the target back
    pub fn snapshot(&mut self) -> Result<Snapshot, RenderError> {
        self.ctx.read_pixels()
    }

    pub fn texture_state(&self) -> TextureState {
        self.state
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    pub fn stats(&self) -> RendererStats {
        self.stats
    }

    pub fn context(&self) -> &C {
        &self.ctx
    }
}
