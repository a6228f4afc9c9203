// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! - Listing available cameras
//! - Showing or resetting the configuration file
//! - Running the live preview with an optional snapshot at the end

use chrono::Local;
use clap::Args;
use edgeview::backends::virtual_camera::{CaptureTrigger, TestPatternConfig};
use edgeview::backends::camera::CaptureRequest;
use edgeview::errors::RenderError;
use edgeview::gpu::{GpuContext, Snapshot};
use edgeview::{
    CameraProvider, Config, LivePipeline, NativeTransform, PipelineOptions, RenderBackend,
    SoftwareContext, TestPatternCamera, WgpuContext,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::warn;

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Stop after this many seconds (default: run until Ctrl+C)
    #[arg(short, long)]
    pub duration: Option<u64>,

    /// Start with edge detection off
    #[arg(long)]
    pub raw: bool,

    /// Render on the CPU instead of the GPU
    #[arg(long)]
    pub software: bool,

    /// Save the last displayed frame as PNG (default: ~/Pictures/edgeview/edgeview_TIMESTAMP.png)
    #[arg(long, value_name = "PATH")]
    pub snapshot: Option<Option<PathBuf>>,
}

/// Folder name for snapshots under the pictures directory
const DEFAULT_SAVE_FOLDER: &str = "edgeview";

fn camera_from_config(config: &Config) -> TestPatternCamera {
    TestPatternCamera::new(TestPatternConfig {
        layout: config.test_pattern_layout,
        trigger: CaptureTrigger::Timer {
            fps: config.test_pattern_fps,
        },
        ..Default::default()
    })
}

/// List all available cameras
pub fn list_cameras() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let cameras = camera_from_config(&config).enumerate_cameras();

    if cameras.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras:");
    println!();
    for (index, camera) in cameras.iter().enumerate() {
        println!("  [{}] {} ({}, {})", index, camera.name, camera.id, camera.facing);
    }
    Ok(())
}

/// Print the configuration file location and contents
pub fn show_config(reset: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = if reset {
        let config = Config::default();
        config.save()?;
        println!("Configuration reset to defaults.");
        config
    } else {
        Config::load()?
    };

    match Config::default_path() {
        Some(path) => println!("Config file: {}", path.display()),
        None => println!("Config file: (no config directory)"),
    }
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

/// Run the live pipeline until the duration elapses or Ctrl+C
pub fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    let backend = if args.software {
        RenderBackend::Software
    } else {
        config.render_backend
    };
    let viewport = config.viewport();

    let options = PipelineOptions {
        processing_enabled: config.edge_detection && !args.raw,
        viewport,
        request: CaptureRequest {
            max_images: config.max_images,
            ..CaptureRequest::preview()
        },
        observer: Some(Box::new(|label: &str, value: f64| {
            print!("\r{}: {:.1}   ", label, value);
            std::io::stdout().flush().ok();
        })),
    };

    let camera = Arc::new(camera_from_config(&config));
    let mut pipeline = LivePipeline::start(
        camera,
        Box::new(NativeTransform::new()),
        move || make_context(backend, viewport),
        options,
    )?;

    if let Some(device) = pipeline.active_device() {
        println!("Using camera: {}", device.name);
    }
    println!(
        "Edge detection: {}",
        if pipeline.processing_enabled() { "on" } else { "off" }
    );
    println!("Running... (press Ctrl+C to stop)");

    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = stop_flag.clone();
    ctrlc::set_handler(move || {
        stop_flag_clone.store(true, Ordering::SeqCst);
    })?;

    let start = Instant::now();
    let target_duration = args.duration.map(Duration::from_secs);

    while target_duration.is_none_or(|target| start.elapsed() < target) {
        if stop_flag.load(Ordering::SeqCst) {
            println!();
            println!("Stopping early...");
            break;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    println!();

    if let Some(path) = args.snapshot {
        let path = path.unwrap_or_else(default_snapshot_path);
        let snapshot = pipeline.snapshot()?;
        save_snapshot(&snapshot, &path)?;
        println!("Snapshot saved: {}", path.display());
    }

    let stats = pipeline.stats();
    pipeline.stop();

    println!(
        "Frames: {} delivered, {} drawn, {} dropped, {} format errors, {} contract violations",
        stats.frames_delivered,
        stats.frames_drawn,
        stats.frames_dropped,
        stats.format_errors,
        stats.contract_violations
    );
    Ok(())
}

/// Build the GPU context on the render thread
///
/// Falls back to the software context when no hardware adapter exists.
fn make_context(
    backend: RenderBackend,
    (width, height): (u32, u32),
) -> Result<Box<dyn GpuContext>, RenderError> {
    match backend {
        RenderBackend::Software => Ok(Box::new(SoftwareContext::new(width, height))),
        RenderBackend::Wgpu => match WgpuContext::new(width, height) {
            Ok(ctx) => Ok(Box::new(ctx)),
            Err(RenderError::NoAdapter(reason)) => {
                warn!(reason = %reason, "No GPU adapter, falling back to software rendering");
                Ok(Box::new(SoftwareContext::new(width, height)))
            }
            Err(e) => Err(e),
        },
    }
}

fn save_snapshot(snapshot: &Snapshot, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let image = image::RgbaImage::from_raw(snapshot.width, snapshot.height, snapshot.pixels.clone())
        .ok_or("Snapshot buffer does not match its dimensions")?;
    image.save(path)?;
    Ok(())
}

fn default_snapshot_path() -> PathBuf {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    dirs::picture_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join(DEFAULT_SAVE_FOLDER)
        .join(format!("edgeview_{}.png", timestamp))
}
