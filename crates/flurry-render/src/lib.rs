//! Flurry Render - wgpu graphics device for the particle overlay
//!
//! This crate implements the core's `GraphicsDevice` on wgpu, drawing either
//! into a winit window surface or an offscreen texture that can be read back.
//! Shader stages are WGSL, compiled, linked and validated with naga before a
//! pipeline is built.

mod context;
mod device;
mod headless;
pub mod program;
pub mod shaders;
pub mod texture;

pub use context::{RenderError, RenderTarget};
pub use device::{WgpuDevice, CLEAR_COLOR};
pub use shaders::builtin_shaders;
pub use texture::{load_texture, procedural_flake, DEFAULT_FLAKE_SIZE};

#[cfg(test)]
mod tests {
    #[test]
    fn quad_shader_wgsl_parses() {
        let source = include_str!("quad_shader.wgsl");
        naga::front::wgsl::parse_str(source).expect("quad_shader.wgsl failed to parse");
    }

    #[test]
    fn timed_quad_shader_wgsl_parses() {
        let source = include_str!("timed_quad_shader.wgsl");
        naga::front::wgsl::parse_str(source).expect("timed_quad_shader.wgsl failed to parse");
    }

    #[test]
    fn flake_shader_wgsl_parses() {
        let source = include_str!("flake_shader.wgsl");
        naga::front::wgsl::parse_str(source).expect("flake_shader.wgsl failed to parse");
    }
}
