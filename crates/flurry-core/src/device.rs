//! Graphics device capability consumed by the particle core
//!
//! The core never talks to a graphics API directly. It drives this trait,
//! which mirrors a bind-then-draw immediate style: `upload_vertices` makes a
//! buffer current, `bind_texture` makes a texture current, and `draw` issues
//! one call over the current pair. Every method completes before returning.

use crate::error::{FlurryError, Result};
use crate::handle::{BufferHandle, TextureHandle};
use crate::types::{MotionModel, Viewport};
use std::fmt;

/// Programmable pipeline stage a shader source targets
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vertex => f.write_str("vertex"),
            Self::Fragment => f.write_str("fragment"),
        }
    }
}

/// Per-vertex record layout, fixed when the program is linked
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VertexLayout {
    /// position.xy, texcoord.uv
    PositionTexCoord,
    /// position.xy, velocity.xy, spawn_time, texcoord.uv
    PositionVelocityTime,
}

impl VertexLayout {
    pub fn for_motion(model: MotionModel) -> Self {
        match model {
            MotionModel::Cpu => Self::PositionTexCoord,
            MotionModel::Gpu => Self::PositionVelocityTime,
        }
    }

    pub fn floats_per_vertex(self) -> usize {
        match self {
            Self::PositionTexCoord => 4,
            Self::PositionVelocityTime => 7,
        }
    }

    pub fn stride_bytes(self) -> usize {
        self.floats_per_vertex() * std::mem::size_of::<f32>()
    }
}

/// Uniforms set once per frame by `prepare_frame`
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameUniforms {
    /// Viewport size in pixels
    pub resolution: [f32; 2],
    /// Scene time in milliseconds (read by the time-driven vertex stage only)
    pub time_ms: f32,
}

/// A decoded RGBA8 image ready for upload
#[derive(Clone, Debug, PartialEq)]
pub struct TextureImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl TextureImage {
    /// Wrap tightly packed RGBA8 pixels, checking the length matches the size
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 {
            return Err(FlurryError::Asset(format!(
                "texture must be non-empty, got {width}x{height}"
            )));
        }
        if pixels.len() != expected {
            return Err(FlurryError::Asset(format!(
                "texture {width}x{height} needs {expected} bytes, got {}",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// 1x1 opaque white
    pub fn white() -> Self {
        Self {
            width: 1,
            height: 1,
            pixels: vec![255; 4],
        }
    }
}

/// Vertex and fragment program text, opaque to the core
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShaderSources {
    pub vertex: String,
    pub fragment: String,
}

impl ShaderSources {
    pub fn new(vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            vertex: vertex.into(),
            fragment: fragment.into(),
        }
    }

    /// Compile both stages, then link for `layout`. Stops at the first failure.
    pub fn install(&self, device: &mut dyn GraphicsDevice, layout: VertexLayout) -> Result<()> {
        device.compile_and_attach(ShaderStage::Vertex, &self.vertex)?;
        device.compile_and_attach(ShaderStage::Fragment, &self.fragment)?;
        device.link_and_validate(layout)
    }
}

/// Graphics context plus the single linked draw program.
///
/// Program setup happens once: every stage is attached with
/// `compile_and_attach`, then `link_and_validate` fixes the vertex layout.
/// A frame is `prepare_frame`, any number of upload/bind/draw sequences,
/// then `finish_frame`.
pub trait GraphicsDevice {
    /// Compile `source` for `stage` and attach it to the program.
    /// Fails with [`FlurryError::ShaderCompile`] carrying the compiler log.
    fn compile_and_attach(&mut self, stage: ShaderStage, source: &str) -> Result<()>;

    /// Link the attached stages against `layout` and validate the result.
    /// Fails with [`FlurryError::Link`] or [`FlurryError::Validate`].
    fn link_and_validate(&mut self, layout: VertexLayout) -> Result<()>;

    fn set_viewport(&mut self, width: u32, height: u32);

    fn viewport(&self) -> Viewport;

    /// Clear the frame and set per-frame uniforms
    fn prepare_frame(&mut self, uniforms: &FrameUniforms) -> Result<()>;

    fn create_vertex_buffer(&mut self, capacity_bytes: usize) -> Result<BufferHandle>;

    fn create_texture(&mut self, image: &TextureImage) -> Result<TextureHandle>;

    /// Replace the buffer's contents with `data` and make it current
    fn upload_vertices(&mut self, buffer: BufferHandle, data: &[u8]) -> Result<()>;

    fn bind_texture(&mut self, texture: TextureHandle) -> Result<()>;

    /// Draw `vertex_count` vertices from the current buffer as a triangle list
    fn draw(&mut self, vertex_count: u32) -> Result<()>;

    /// Submit everything recorded since `prepare_frame`
    fn finish_frame(&mut self) -> Result<()>;

    fn release_buffer(&mut self, buffer: BufferHandle);

    fn release_texture(&mut self, texture: TextureHandle);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layout_strides() {
        assert_eq!(VertexLayout::for_motion(MotionModel::Cpu).stride_bytes(), 16);
        assert_eq!(VertexLayout::for_motion(MotionModel::Gpu).stride_bytes(), 28);
    }

    #[test]
    fn texture_image_checks_length() {
        assert!(TextureImage::new(2, 2, vec![0; 16]).is_ok());
        assert!(matches!(
            TextureImage::new(2, 2, vec![0; 15]),
            Err(FlurryError::Asset(_))
        ));
        assert!(TextureImage::new(0, 4, Vec::new()).is_err());
    }
}
