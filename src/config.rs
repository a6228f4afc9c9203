// SPDX-License-Identifier: GPL-3.0-only

use crate::backends::virtual_camera::ChromaLayout;
use crate::constants::{capture, display};
use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Application ID, also the configuration directory name
pub const APP_ID: &str = "edgeview";

const CONFIG_FILE: &str = "config.json";

/// GPU context used for presentation
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum RenderBackend {
    /// Hardware adapter through wgpu
    #[default]
    Wgpu,
    /// CPU rasteriser, no adapter needed
    Software,
}

impl std::fmt::Display for RenderBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Wgpu => write!(f, "wgpu"),
            Self::Software => write!(f, "software"),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Start with the edge detector enabled
    pub edge_detection: bool,
    pub render_backend: RenderBackend,
    /// Chroma plane layout produced by the test pattern camera
    pub test_pattern_layout: ChromaLayout,
    pub test_pattern_fps: u32,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Device-side image pool size
    pub max_images: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            edge_detection: true,
            render_backend: RenderBackend::default(),
            test_pattern_layout: ChromaLayout::default(),
            test_pattern_fps: capture::TEST_PATTERN_FPS,
            viewport_width: display::DEFAULT_VIEWPORT_WIDTH,
            viewport_height: display::DEFAULT_VIEWPORT_HEIGHT,
            max_images: capture::MAX_IMAGES,
        }
    }
}

impl Config {
    /// Default location: `<config dir>/edgeview/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_ID).join(CONFIG_FILE))
    }

    /// Load from the default location, falling back to defaults
    pub fn load() -> AppResult<Self> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => {
                debug!("No config directory, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load from `path`
    ///
    /// A missing file yields the defaults; an unreadable or malformed one is
    /// an [`AppError::Config`].
    pub fn load_from(path: &Path) -> AppResult<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Config file not found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(AppError::Config(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        serde_json::from_str(&contents)
            .map_err(|e| AppError::Config(format!("Invalid config {}: {}", path.display(), e)))
    }

    /// Write to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AppError::Storage(format!("Failed to create {}: {}", parent.display(), e)))?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| AppError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, json)
            .map_err(|e| AppError::Storage(format!("Failed to write {}: {}", path.display(), e)))?;
        info!(path = %path.display(), "Config saved");
        Ok(())
    }

    /// Write to the default location
    pub fn save(&self) -> AppResult<()> {
        let path = Self::default_path()
            .ok_or_else(|| AppError::Config("No config directory available".to_string()))?;
        self.save_to(&path)
    }

    pub fn viewport(&self) -> (u32, u32) {
        (self.viewport_width, self.viewport_height)
    }
}
