//! wgpu context setup and render targets

use flurry_core::FlurryError;
use std::sync::Arc;
use thiserror::Error;
use winit::window::Window;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to create surface: {0}")]
    SurfaceCreation(String),
    #[error("Failed to get adapter")]
    AdapterNotFound,
    #[error("Failed to create device: {0}")]
    DeviceCreation(String),
    #[error("Surface error: {0}")]
    SurfaceError(String),
    #[error("Failed to read render buffer: {0}")]
    BufferReadFailed(String),
    #[error("Window surfaces cannot be read back")]
    NotReadable,
}

impl From<RenderError> for FlurryError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::SurfaceCreation(_)
            | RenderError::AdapterNotFound
            | RenderError::DeviceCreation(_) => FlurryError::ContextUnavailable(err.to_string()),
            RenderError::SurfaceError(_)
            | RenderError::BufferReadFailed(_)
            | RenderError::NotReadable => FlurryError::Draw(err.to_string()),
        }
    }
}

/// Texels and the clear colour are used as stored bytes, so both targets
/// prefer a linear format
pub const OFFSCREEN_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Where frames are drawn: a window surface or an offscreen texture
pub enum RenderTarget {
    Window {
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
    },
    Offscreen {
        texture: wgpu::Texture,
        width: u32,
        height: u32,
    },
}

/// The texture a frame draws into, presented on `finish_frame`
pub struct FrameTarget {
    surface_texture: Option<wgpu::SurfaceTexture>,
    pub view: wgpu::TextureView,
}

impl FrameTarget {
    pub fn present(self) {
        if let Some(texture) = self.surface_texture {
            texture.present();
        }
    }
}

impl RenderTarget {
    pub fn format(&self) -> wgpu::TextureFormat {
        match self {
            Self::Window { config, .. } => config.format,
            Self::Offscreen { .. } => OFFSCREEN_FORMAT,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        match self {
            Self::Window { config, .. } => (config.width, config.height),
            Self::Offscreen { width, height, .. } => (*width, *height),
        }
    }

    /// Reconfigure for a new size. Zero sizes (minimized windows) are ignored.
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        match self {
            Self::Window { surface, config } => {
                config.width = width;
                config.height = height;
                surface.configure(device, config);
            }
            Self::Offscreen {
                texture,
                width: w,
                height: h,
            } => {
                *texture = create_offscreen_texture(device, width, height);
                *w = width;
                *h = height;
            }
        }
    }

    /// Get the texture for the next frame
    pub fn acquire(&mut self, device: &wgpu::Device) -> Result<FrameTarget, RenderError> {
        match self {
            Self::Window { surface, config } => {
                let surface_texture = match surface.get_current_texture() {
                    Ok(texture) => texture,
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        surface.configure(device, config);
                        surface
                            .get_current_texture()
                            .map_err(|e| RenderError::SurfaceError(e.to_string()))?
                    }
                    Err(e) => return Err(RenderError::SurfaceError(e.to_string())),
                };
                let view = surface_texture
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());
                Ok(FrameTarget {
                    surface_texture: Some(surface_texture),
                    view,
                })
            }
            Self::Offscreen { texture, .. } => Ok(FrameTarget {
                surface_texture: None,
                view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
            }),
        }
    }
}

async fn request_device(
    instance: &wgpu::Instance,
    surface: Option<&wgpu::Surface<'_>>,
    label: &str,
) -> Result<(wgpu::Adapter, wgpu::Device, wgpu::Queue), RenderError> {
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: surface,
            force_fallback_adapter: false,
        })
        .await
        .ok_or(RenderError::AdapterNotFound)?;

    let (device, queue) = adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: Some(label),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
                memory_hints: Default::default(),
            },
            None,
        )
        .await
        .map_err(|e| RenderError::DeviceCreation(e.to_string()))?;

    Ok((adapter, device, queue))
}

/// Open a device presenting to `window`
pub async fn open_window(
    window: Arc<Window>,
) -> Result<(wgpu::Device, wgpu::Queue, RenderTarget), RenderError> {
    let size = window.inner_size();

    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });

    let surface = instance
        .create_surface(window)
        .map_err(|e| RenderError::SurfaceCreation(e.to_string()))?;

    let (adapter, device, queue) = request_device(&instance, Some(&surface), "Flurry Device").await?;

    let caps = surface.get_capabilities(&adapter);
    let format = caps
        .formats
        .iter()
        .find(|f| !f.is_srgb())
        .or_else(|| caps.formats.first())
        .copied()
        .ok_or_else(|| RenderError::SurfaceCreation("surface reports no formats".into()))?;
    let alpha_mode = caps
        .alpha_modes
        .first()
        .copied()
        .unwrap_or(wgpu::CompositeAlphaMode::Auto);

    let config = wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format,
        width: size.width.max(1),
        height: size.height.max(1),
        present_mode: wgpu::PresentMode::AutoVsync,
        alpha_mode,
        view_formats: vec![],
        desired_maximum_frame_latency: 2,
    };
    surface.configure(&device, &config);

    Ok((device, queue, RenderTarget::Window { surface, config }))
}

/// Open a device drawing into a `width` x `height` offscreen texture
pub async fn open_headless(
    width: u32,
    height: u32,
) -> Result<(wgpu::Device, wgpu::Queue, RenderTarget), RenderError> {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        ..Default::default()
    });

    let (_, device, queue) = request_device(&instance, None, "Flurry Headless Device").await?;
    let width = width.max(1);
    let height = height.max(1);
    let texture = create_offscreen_texture(&device, width, height);

    Ok((
        device,
        queue,
        RenderTarget::Offscreen {
            texture,
            width,
            height,
        },
    ))
}

fn create_offscreen_texture(device: &wgpu::Device, width: u32, height: u32) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Offscreen Color Texture"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: OFFSCREEN_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_errors_are_fatal_kinds() {
        let err: FlurryError = RenderError::AdapterNotFound.into();
        assert!(matches!(err, FlurryError::ContextUnavailable(_)));
        let err: FlurryError = RenderError::SurfaceError("timeout".into()).into();
        assert!(matches!(err, FlurryError::Draw(_)));
    }
}
