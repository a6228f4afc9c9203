// SPDX-License-Identifier: MPL-2.0

//! Pixel format handling
//!
//! - [`nv21`]: planar YUV 4:2:0 repacking into NV21
//! - [`conversions`]: NV21 to RGBA and luma extraction

pub mod conversions;
pub mod nv21;

pub use nv21::{SemiPlanarFrame, convert as convert_to_nv21};
