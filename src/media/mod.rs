// SPDX-License-Identifier: MPL-2.0

//! Media processing utilities
//!
//! Camera images arrive as planar YUV 4:2:0 with device-specific strides.
//! The [`formats`] module repacks them into tightly packed NV21, the layout
//! the transform stage consumes, and converts NV21 to RGBA.

pub mod formats;

pub use formats::{SemiPlanarFrame, convert_to_nv21};
