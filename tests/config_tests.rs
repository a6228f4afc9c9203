// SPDX-License-Identifier: MPL-2.0

//! Integration tests for configuration module

use edgeview::{AppError, ChromaLayout, Config, RenderBackend};
use std::path::PathBuf;

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir()
        .join(format!("edgeview-test-{}-{}", std::process::id(), name))
        .join("config.json")
}

#[test]
fn test_config_default() {
    let config = Config::default();

    assert!(config.edge_detection, "Edge detection should be on by default");
    assert_eq!(config.render_backend, RenderBackend::Wgpu);
    assert_eq!(config.test_pattern_layout, ChromaLayout::Planar);
    assert_eq!(config.test_pattern_fps, 30);
    assert_eq!(config.viewport(), (640, 480));
    assert_eq!(config.max_images, 2);
}

#[test]
fn test_missing_file_gives_defaults() {
    let path = temp_path("missing");
    assert_eq!(Config::load_from(&path).unwrap(), Config::default());
}

#[test]
fn test_save_then_load() {
    let path = temp_path("save");
    let config = Config {
        edge_detection: false,
        render_backend: RenderBackend::Software,
        test_pattern_layout: ChromaLayout::Interleaved,
        ..Default::default()
    };

    config.save_to(&path).unwrap();
    assert_eq!(Config::load_from(&path).unwrap(), config);

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[test]
fn test_partial_file_fills_in_defaults() {
    let path = temp_path("partial");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, r#"{ "render_backend": "Software" }"#).unwrap();

    let config = Config::load_from(&path).unwrap();
    assert_eq!(config.render_backend, RenderBackend::Software);
    assert!(config.edge_detection);

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}

#[test]
fn test_malformed_file_is_config_error() {
    let path = temp_path("malformed");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "{ not json").unwrap();

    assert!(matches!(Config::load_from(&path), Err(AppError::Config(_))));

    let _ = std::fs::remove_dir_all(path.parent().unwrap());
}
