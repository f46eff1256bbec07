//! No-op graphics device that records every call, for tests and dry runs

use flurry_core::{
    BufferHandle, FlurryError, FrameUniforms, GraphicsDevice, HandleAllocator, Result,
    ShaderStage, TextureHandle, TextureImage, VertexLayout, Viewport,
};
use std::collections::{HashMap, HashSet};

/// One recorded device call
#[derive(Clone, Debug, PartialEq)]
pub enum DeviceCall {
    CompileAndAttach(ShaderStage),
    LinkAndValidate(VertexLayout),
    SetViewport(u32, u32),
    PrepareFrame(FrameUniforms),
    CreateVertexBuffer {
        buffer: BufferHandle,
        capacity_bytes: usize,
    },
    CreateTexture {
        texture: TextureHandle,
        width: u32,
        height: u32,
    },
    UploadVertices {
        buffer: BufferHandle,
        bytes: usize,
    },
    BindTexture(TextureHandle),
    Draw {
        vertex_count: u32,
    },
    FinishFrame,
    ReleaseBuffer(BufferHandle),
    ReleaseTexture(TextureHandle),
}

/// A [`GraphicsDevice`] that draws nothing and remembers everything.
///
/// Handles are tracked, so uploads to released or foreign buffers fail the
/// same way a real device would. Failures can be injected per stage or for
/// every draw call.
pub struct RecordingDevice {
    calls: Vec<DeviceCall>,
    viewport: Viewport,
    handles: HandleAllocator,
    buffers: HashMap<BufferHandle, Vec<u8>>,
    textures: HashSet<TextureHandle>,
    current_buffer: Option<BufferHandle>,
    attached: Vec<ShaderStage>,
    linked: Option<VertexLayout>,
    /// Stage whose compilation fails with a canned log
    pub reject_stage: Option<ShaderStage>,
    /// Make every `draw` fail
    pub fail_draws: bool,
}

impl Default for RecordingDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self::with_viewport(Viewport::default())
    }

    pub fn with_viewport(viewport: Viewport) -> Self {
        Self {
            calls: Vec::new(),
            viewport,
            handles: HandleAllocator::new(),
            buffers: HashMap::new(),
            textures: HashSet::new(),
            current_buffer: None,
            attached: Vec::new(),
            linked: None,
            reject_stage: None,
            fail_draws: false,
        }
    }

    pub fn calls(&self) -> &[DeviceCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Vertex counts of every draw call, in order
    pub fn draw_counts(&self) -> Vec<u32> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                DeviceCall::Draw { vertex_count } => Some(*vertex_count),
                _ => None,
            })
            .collect()
    }

    /// Number of `prepare_frame` calls
    pub fn frames_prepared(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, DeviceCall::PrepareFrame(_)))
            .count()
    }

    /// Last bytes uploaded to `buffer`
    pub fn uploaded(&self, buffer: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(|b| b.as_slice())
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn linked_layout(&self) -> Option<VertexLayout> {
        self.linked
    }
}

impl GraphicsDevice for RecordingDevice {
    fn compile_and_attach(&mut self, stage: ShaderStage, source: &str) -> Result<()> {
        self.calls.push(DeviceCall::CompileAndAttach(stage));
        if self.reject_stage == Some(stage) {
            return Err(FlurryError::ShaderCompile {
                stage,
                log: format!("rejected {} bytes of source", source.len()),
            });
        }
        self.attached.push(stage);
        Ok(())
    }

    fn link_and_validate(&mut self, layout: VertexLayout) -> Result<()> {
        self.calls.push(DeviceCall::LinkAndValidate(layout));
        for stage in [ShaderStage::Vertex, ShaderStage::Fragment] {
            if !self.attached.contains(&stage) {
                return Err(FlurryError::Link(format!("no {stage} stage attached")));
            }
        }
        self.linked = Some(layout);
        Ok(())
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.calls.push(DeviceCall::SetViewport(width, height));
        self.viewport = Viewport::from_pixels(width, height);
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn prepare_frame(&mut self, uniforms: &FrameUniforms) -> Result<()> {
        self.calls.push(DeviceCall::PrepareFrame(*uniforms));
        Ok(())
    }

    fn create_vertex_buffer(&mut self, capacity_bytes: usize) -> Result<BufferHandle> {
        let buffer = self.handles.next_buffer();
        self.buffers.insert(buffer, Vec::new());
        self.calls.push(DeviceCall::CreateVertexBuffer {
            buffer,
            capacity_bytes,
        });
        Ok(buffer)
    }

    fn create_texture(&mut self, image: &TextureImage) -> Result<TextureHandle> {
        let texture = self.handles.next_texture();
        self.textures.insert(texture);
        self.calls.push(DeviceCall::CreateTexture {
            texture,
            width: image.width,
            height: image.height,
        });
        Ok(texture)
    }

    fn upload_vertices(&mut self, buffer: BufferHandle, data: &[u8]) -> Result<()> {
        self.calls.push(DeviceCall::UploadVertices {
            buffer,
            bytes: data.len(),
        });
        let Some(contents) = self.buffers.get_mut(&buffer) else {
            return Err(FlurryError::UnknownHandle(buffer.to_string()));
        };
        contents.clear();
        contents.extend_from_slice(data);
        self.current_buffer = Some(buffer);
        Ok(())
    }

    fn bind_texture(&mut self, texture: TextureHandle) -> Result<()> {
        self.calls.push(DeviceCall::BindTexture(texture));
        if !self.textures.contains(&texture) {
            return Err(FlurryError::UnknownHandle(texture.to_string()));
        }
        Ok(())
    }

    fn draw(&mut self, vertex_count: u32) -> Result<()> {
        self.calls.push(DeviceCall::Draw { vertex_count });
        if self.fail_draws {
            return Err(FlurryError::Draw("injected draw failure".into()));
        }
        if self.current_buffer.is_none() {
            return Err(FlurryError::Draw("no vertex buffer bound".into()));
        }
        Ok(())
    }

    fn finish_frame(&mut self) -> Result<()> {
        self.calls.push(DeviceCall::FinishFrame);
        Ok(())
    }

    fn release_buffer(&mut self, buffer: BufferHandle) {
        self.calls.push(DeviceCall::ReleaseBuffer(buffer));
        self.buffers.remove(&buffer);
        if self.current_buffer == Some(buffer) {
            self.current_buffer = None;
        }
    }

    fn release_texture(&mut self, texture: TextureHandle) {
        self.calls.push(DeviceCall::ReleaseTexture(texture));
        self.textures.remove(&texture);
    }
}
