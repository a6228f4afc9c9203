// SPDX-License-Identifier: MPL-2.0

//! edgeview - live camera preview with a pluggable per-frame transform
//!
//! Frames flow from a capture device through an NV21 repack, an optional
//! transform (edge detection by default) and a latest-wins hand-off slot to
//! a GPU renderer that draws them as a full-screen textured quad.
//!
//! # Architecture
//!
//! - [`backends`]: Camera provider traits, the frame source and a test pattern device
//! - [`media`]: Planar YUV to NV21 repacking and colour conversion
//! - [`pipelines`]: Transform, pending frame slot, FPS counter, live pipeline
//! - [`gpu`]: GPU context trait, wgpu and software contexts, renderer, render loop
//! - [`shaders`]: WGSL sources for the preview quad
//! - [`config`]: User configuration handling
//!
//! # Example
//!
//! ```ignore
//! let camera = Arc::new(TestPatternCamera::default());
//! let pipeline = LivePipeline::start(
//!     camera,
//!     Box::new(NativeTransform::new()),
//!     || Ok(Box::new(SoftwareContext::new(640, 480)) as Box<dyn GpuContext>),
//!     PipelineOptions::default(),
//! )?;
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod gpu;
pub mod media;
pub mod pipelines;
pub mod shaders;
pub mod worker;

// Re-export commonly used types
pub use backends::camera::{CameraDevice, CameraProvider, FrameSource, LensFacing};
pub use backends::virtual_camera::{ChromaLayout, TestPatternCamera, TestPatternConfig};
pub use config::{Config, RenderBackend};
pub use errors::{AppError, AppResult};
pub use gpu::{GpuContext, Renderer, SoftwareContext, WgpuContext};
pub use media::{SemiPlanarFrame, convert_to_nv21};
pub use pipelines::{
    FrameTransform, LivePipeline, NativeTransform, PendingFrameSlot, PipelineOptions,
    TransformedFrame,
};
