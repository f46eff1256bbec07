//! wgpu implementation of the graphics device contract
//!
//! Calls are immediate: every `draw` encodes and submits its own render pass,
//! so a buffer uploaded twice in one frame (a mid-frame flush) draws each
//! upload's contents. `prepare_frame` submits the clear pass; `finish_frame`
//! presents.

use crate::context::{self, FrameTarget, RenderTarget};
use crate::headless::read_texture_rgba;
use crate::program::{self, AttachedStages, Program};
use crate::texture::{texture_bind_group_layout, GpuTexture};
use bytemuck::{Pod, Zeroable};
use flurry_core::{
    BufferHandle, FlurryError, FrameUniforms, GraphicsDevice, HandleAllocator, Result,
    ShaderStage, TextureHandle, TextureImage, VertexLayout, Viewport,
};
use std::collections::HashMap;
use std::sync::Arc;
use winit::window::Window;

/// Background behind the particles
pub const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.75,
    g: 0.85,
    b: 0.8,
    a: 1.0,
};

/// Frame uniforms as laid out in WGSL (16 bytes)
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct FrameUniformsGpu {
    resolution: [f32; 2],
    time_ms: f32,
    _pad: f32,
}

impl From<&FrameUniforms> for FrameUniformsGpu {
    fn from(u: &FrameUniforms) -> Self {
        Self {
            resolution: u.resolution,
            time_ms: u.time_ms,
            _pad: 0.0,
        }
    }
}

struct VertexBuffer {
    buffer: wgpu::Buffer,
    capacity: u64,
    uploaded: u64,
}

/// A [`GraphicsDevice`] drawing through wgpu into a window or offscreen texture
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    target: RenderTarget,
    viewport: Viewport,
    handles: HandleAllocator,
    stages: AttachedStages,
    program: Option<Program>,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    uniform_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    buffers: HashMap<BufferHandle, VertexBuffer>,
    textures: HashMap<TextureHandle, GpuTexture>,
    current_buffer: Option<BufferHandle>,
    current_texture: Option<TextureHandle>,
    frame: Option<FrameTarget>,
}

impl WgpuDevice {
    /// Open a device presenting to `window`
    pub async fn windowed(window: Arc<Window>) -> Result<Self> {
        let (device, queue, target) = context::open_window(window).await?;
        Ok(Self::with_target(device, queue, target))
    }

    /// Open a device rendering offscreen; read results with [`Self::read_pixels`]
    pub async fn headless(width: u32, height: u32) -> Result<Self> {
        let (device, queue, target) = context::open_headless(width, height).await?;
        Ok(Self::with_target(device, queue, target))
    }

    fn with_target(device: wgpu::Device, queue: wgpu::Queue, target: RenderTarget) -> Self {
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
            label: Some("Frame Uniform Bind Group Layout"),
        });
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Frame Uniform Buffer"),
            size: std::mem::size_of::<FrameUniformsGpu>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
            label: Some("Frame Uniform Bind Group"),
        });
        let texture_layout = texture_bind_group_layout(&device);
        let (width, height) = target.size();

        Self {
            device,
            queue,
            target,
            viewport: Viewport::from_pixels(width, height),
            handles: HandleAllocator::new(),
            stages: AttachedStages::default(),
            program: None,
            uniform_buffer,
            uniform_bind_group,
            uniform_layout,
            texture_layout,
            buffers: HashMap::new(),
            textures: HashMap::new(),
            current_buffer: None,
            current_texture: None,
            frame: None,
        }
    }

    /// Read the offscreen target as tightly packed RGBA8, top row first
    pub fn read_pixels(&self) -> Result<Vec<u8>> {
        match &self.target {
            RenderTarget::Offscreen {
                texture,
                width,
                height,
            } => Ok(read_texture_rgba(
                &self.device,
                &self.queue,
                texture,
                *width,
                *height,
            )?),
            RenderTarget::Window { .. } => Err(context::RenderError::NotReadable.into()),
        }
    }

    /// Target size in pixels
    pub fn size(&self) -> (u32, u32) {
        self.target.size()
    }

    fn render_pass<'e>(
        encoder: &'e mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
        load: wgpu::LoadOp<wgpu::Color>,
    ) -> wgpu::RenderPass<'e> {
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Flurry Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        })
    }
}

impl GraphicsDevice for WgpuDevice {
    fn compile_and_attach(&mut self, stage: ShaderStage, source: &str) -> Result<()> {
        let compiled = program::compile_stage(stage, source)?;
        self.stages.attach(stage, compiled);
        log::debug!("Compiled {stage} stage ({} bytes)", source.len());
        Ok(())
    }

    fn link_and_validate(&mut self, layout: VertexLayout) -> Result<()> {
        let linked = program::link(&self.stages, layout)?;
        program::validate(&self.stages)?;
        let program = program::create_pipeline(
            &self.device,
            self.target.format(),
            &self.stages,
            &linked,
            &[&self.uniform_layout, &self.texture_layout],
        )?;
        log::debug!(
            "Linked {}/{} for {:?}",
            linked.vertex_entry,
            linked.fragment_entry,
            layout
        );
        self.program = Some(program);
        Ok(())
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.target.resize(&self.device, width, height);
        let (width, height) = self.target.size();
        self.viewport = Viewport::from_pixels(width, height);
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn prepare_frame(&mut self, uniforms: &FrameUniforms) -> Result<()> {
        if self.frame.is_some() {
            return Err(FlurryError::Draw(
                "prepare_frame called before the previous frame finished".into(),
            ));
        }
        let frame = self.target.acquire(&self.device)?;

        self.queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::bytes_of(&FrameUniformsGpu::from(uniforms)),
        );

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Clear Encoder"),
            });
        drop(Self::render_pass(
            &mut encoder,
            &frame.view,
            wgpu::LoadOp::Clear(CLEAR_COLOR),
        ));
        self.queue.submit(std::iter::once(encoder.finish()));

        self.frame = Some(frame);
        Ok(())
    }

    fn create_vertex_buffer(&mut self, capacity_bytes: usize) -> Result<BufferHandle> {
        let size = (capacity_bytes as u64)
            .max(wgpu::COPY_BUFFER_ALIGNMENT)
            .next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT);
        if size > self.device.limits().max_buffer_size {
            return Err(FlurryError::ResourceCreationFailed(format!(
                "vertex buffer of {size} bytes exceeds the device limit"
            )));
        }

        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Quad Batch Buffer"),
            size,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(FlurryError::ResourceCreationFailed(err.to_string()));
        }

        let handle = self.handles.next_buffer();
        self.buffers.insert(
            handle,
            VertexBuffer {
                buffer,
                capacity: size,
                uploaded: 0,
            },
        );
        Ok(handle)
    }

    fn create_texture(&mut self, image: &TextureImage) -> Result<TextureHandle> {
        let max = self.device.limits().max_texture_dimension_2d;
        if image.width > max || image.height > max {
            return Err(FlurryError::ResourceCreationFailed(format!(
                "texture {}x{} exceeds the device limit of {max}",
                image.width, image.height
            )));
        }

        let handle = self.handles.next_texture();
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let texture = GpuTexture::upload(
            &self.device,
            &self.queue,
            &self.texture_layout,
            image,
            &format!("Layer Texture {}", handle.raw()),
        );
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(FlurryError::ResourceCreationFailed(err.to_string()));
        }

        self.textures.insert(handle, texture);
        Ok(handle)
    }

    fn upload_vertices(&mut self, buffer: BufferHandle, data: &[u8]) -> Result<()> {
        let vertex_buffer = self
            .buffers
            .get_mut(&buffer)
            .ok_or_else(|| FlurryError::UnknownHandle(buffer.to_string()))?;
        let len = data.len() as u64;
        if len > vertex_buffer.capacity {
            return Err(FlurryError::Draw(format!(
                "upload of {len} bytes exceeds {buffer} capacity {}",
                vertex_buffer.capacity
            )));
        }
        if len > 0 {
            self.queue.write_buffer(&vertex_buffer.buffer, 0, data);
        }
        vertex_buffer.uploaded = len;
        self.current_buffer = Some(buffer);
        Ok(())
    }

    fn bind_texture(&mut self, texture: TextureHandle) -> Result<()> {
        if !self.textures.contains_key(&texture) {
            return Err(FlurryError::UnknownHandle(texture.to_string()));
        }
        self.current_texture = Some(texture);
        Ok(())
    }

    fn draw(&mut self, vertex_count: u32) -> Result<()> {
        let program = self
            .program
            .as_ref()
            .ok_or_else(|| FlurryError::Draw("no linked program".into()))?;
        let frame = self
            .frame
            .as_ref()
            .ok_or_else(|| FlurryError::Draw("draw outside prepare_frame/finish_frame".into()))?;
        let buffer = self
            .current_buffer
            .and_then(|handle| self.buffers.get(&handle))
            .ok_or_else(|| FlurryError::Draw("no vertex buffer bound".into()))?;
        let texture = self
            .current_texture
            .and_then(|handle| self.textures.get(&handle))
            .ok_or_else(|| FlurryError::Draw("no texture bound".into()))?;

        let byte_len = vertex_count as u64 * program.layout.stride_bytes() as u64;
        if byte_len > buffer.uploaded {
            return Err(FlurryError::Draw(format!(
                "draw of {vertex_count} vertices reads past the {} bytes uploaded",
                buffer.uploaded
            )));
        }
        if vertex_count == 0 {
            return Ok(());
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Quad Batch Encoder"),
            });
        {
            let mut pass = Self::render_pass(&mut encoder, &frame.view, wgpu::LoadOp::Load);
            pass.set_pipeline(&program.pipeline);
            pass.set_bind_group(0, &self.uniform_bind_group, &[]);
            pass.set_bind_group(1, &texture.bind_group, &[]);
            pass.set_vertex_buffer(0, buffer.buffer.slice(..byte_len));
            pass.draw(0..vertex_count, 0..1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn finish_frame(&mut self) -> Result<()> {
        let frame = self
            .frame
            .take()
            .ok_or_else(|| FlurryError::Draw("finish_frame without prepare_frame".into()))?;
        frame.present();
        Ok(())
    }

    fn release_buffer(&mut self, buffer: BufferHandle) {
        if let Some(vertex_buffer) = self.buffers.remove(&buffer) {
            vertex_buffer.buffer.destroy();
        }
        if self.current_buffer == Some(buffer) {
            self.current_buffer = None;
        }
    }

    fn release_texture(&mut self, texture: TextureHandle) {
        if let Some(gpu_texture) = self.textures.remove(&texture) {
            gpu_texture.texture.destroy();
        }
        if self.current_texture == Some(texture) {
            self.current_texture = None;
        }
    }
}
