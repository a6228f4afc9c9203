// SPDX-License-Identifier: MPL-2.0

//! Backend abstraction layer for camera capture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               Live pipeline                 │
//! └────────────────────┬────────────────────────┘
//!                      │
//! ┌────────────────────┴────────────────────────┐
//! │              Backend Layer                  │
//! │  ┌─────────────────┐  ┌──────────────────┐  │
//! │  │  Camera traits  │◀─│  Test pattern    │  │
//! │  │  FrameSource    │  │  camera          │  │
//! │  └─────────────────┘  └──────────────────┘  │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`camera`]: Provider and session traits, the frame source worker
//! - [`virtual_camera`]: Synthetic device producing a moving test pattern

pub mod camera;
pub mod virtual_camera;
