// SPDX-License-Identifier: GPL-3.0-only
//! Shader sources
//!
//! WGSL is the single source of truth for both GPU contexts: the wgpu
//! context compiles it, the software context mirrors its behaviour on the CPU.

pub mod preview;

pub use preview::{FRAGMENT_ENTRY_POINT, FRAGMENT_SHADER, VERTEX_ENTRY_POINT, VERTEX_SHADER};
