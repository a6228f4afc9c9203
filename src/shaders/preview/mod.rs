// SPDX-License-Identifier: GPL-3.0-only

//! Preview quad program
//!
//! The vertex stage passes positions and texture coordinates through
//! unchanged; the fragment stage samples the texture bound on unit 0.

/// Vertex stage source, entry point [`VERTEX_ENTRY_POINT`]
pub const VERTEX_SHADER: &str = include_str!("quad_vertex.wgsl");

/// Fragment stage source, entry point [`FRAGMENT_ENTRY_POINT`]
pub const FRAGMENT_SHADER: &str = include_str!("quad_fragment.wgsl");

pub const VERTEX_ENTRY_POINT: &str = "vs_main";
pub const FRAGMENT_ENTRY_POINT: &str = "fs_main";

#[cfg(test)]
mod tests {
    use super::*;

    /// Validate that a WGSL shader compiles successfully using naga
    fn validate_shader(name: &str, source: &str) -> naga::Module {
        let module = match naga::front::wgsl::parse_str(source) {
            Ok(module) => module,
            Err(e) => panic!("Shader '{}' parse failed: {:?}", name, e),
        };

        if let Err(e) = naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        )
        .validate(&module)
        {
            panic!("Shader '{}' validation failed: {:?}", name, e);
        }

        module
    }

    fn has_entry_point(module: &naga::Module, name: &str, stage: naga::ShaderStage) -> bool {
        module
            .entry_points
            .iter()
            .any(|ep| ep.name == name && ep.stage == stage)
    }

    #[test]
    fn test_vertex_shader_validates() {
        let module = validate_shader("quad_vertex", VERTEX_SHADER);
        assert!(has_entry_point(
            &module,
            VERTEX_ENTRY_POINT,
            naga::ShaderStage::Vertex
        ));
    }

    #[test]
    fn test_fragment_shader_validates() {
        let module = validate_shader("quad_fragment", FRAGMENT_SHADER);
        assert!(has_entry_point(
            &module,
            FRAGMENT_ENTRY_POINT,
            naga::ShaderStage::Fragment
        ));
    }
}
