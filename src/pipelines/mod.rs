// SPDX-License-Identifier: MPL-2.0

//! Frame processing pipeline
//!
//! # Pipeline Architecture
//!
//! ```text
//! ┌──────────────┐     ┌───────────────────┐     ┌──────────────────┐     ┌──────────┐
//! │ Camera Frame │ ──▶ │  FrameTransform   │ ──▶ │ PendingFrameSlot │ ──▶ │ Renderer │
//! │   (NV21)     │     │  - NV21→RGBA      │     │  (latest wins)   │     │  (GPU)   │
//! │              │     │  - Edge detection │     │                  │     │          │
//! └──────────────┘     └───────────────────┘     └──────────────────┘     └──────────┘
//! ```
//!
//! # Modules
//!
//! - [`transform`]: the per-frame transform contract and the built-in transform
//! - [`slot`]: single-slot handoff to the render thread
//! - [`stats`]: FPS accounting
//! - [`live`]: producer glue and the top-level live pipeline

pub mod live;
pub mod slot;
pub mod stats;
pub mod transform;

pub use live::{FrameProcessor, LivePipeline, PipelineOptions, PipelineStats};
pub use slot::PendingFrameSlot;
pub use stats::{FpsCounter, StatsObserver};
pub use transform::{FrameTransform, NativeTransform, TransformedFrame, apply_transform};
