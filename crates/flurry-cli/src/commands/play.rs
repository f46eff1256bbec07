//! Play command: a window whose redraws are driven by the scene's frame requests

use super::options::{build_scene, EmitterArgs, Setup};
use anyhow::{anyhow, Context, Result};
use flurry_core::SystemClock;
use flurry_particles::{FrameScheduler, Scene};
use flurry_render::WgpuDevice;
use std::sync::Arc;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

pub struct PlayArgs {
    pub emitter: EmitterArgs,
    pub width: u32,
    pub height: u32,
    pub fullscreen: bool,
}

pub fn run(args: PlayArgs) -> Result<()> {
    let setup = args.emitter.resolve()?;

    println!("Controls:");
    println!("  Space    - Pause / resume");
    println!("  Escape   - Exit");
    println!("  F11      - Toggle fullscreen");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = FlurryApp::new(setup, PhysicalSize::new(args.width, args.height), args.fullscreen);
    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Maps frame requests onto winit redraw requests
struct WindowScheduler {
    window: Arc<Window>,
}

impl FrameScheduler for WindowScheduler {
    fn request_frame(&mut self) {
        self.window.request_redraw();
    }
}

struct FlurryApp {
    setup: Setup,
    size: PhysicalSize<u32>,
    fullscreen: bool,
    window: Option<Arc<Window>>,
    scene: Option<Scene<WgpuDevice>>,
    error: Option<anyhow::Error>,
}

impl FlurryApp {
    fn new(setup: Setup, size: PhysicalSize<u32>, fullscreen: bool) -> Self {
        Self {
            setup,
            size,
            fullscreen,
            window: None,
            scene: None,
            error: None,
        }
    }

    fn initialize(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window_attrs = Window::default_attributes()
            .with_title("Flurry")
            .with_inner_size(self.size);
        let window = Arc::new(
            event_loop
                .create_window(window_attrs)
                .context("Failed to create window")?,
        );
        if self.fullscreen {
            window.set_fullscreen(Some(winit::window::Fullscreen::Borderless(None)));
        }

        let device = pollster::block_on(WgpuDevice::windowed(window.clone()))
            .context("Failed to create render context")?;
        let scheduler = WindowScheduler {
            window: window.clone(),
        };
        let mut scene = build_scene(device, &self.setup, Box::new(SystemClock::new()), Box::new(scheduler))?;
        scene.start();

        self.window = Some(window);
        self.scene = Some(scene);
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::error!("{err:#}");
        self.error = Some(err);
        self.shutdown(event_loop);
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(scene) = &mut self.scene {
            scene.destroy();
        }
        event_loop.exit();
    }
}

impl ApplicationHandler for FlurryApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(err) = self.initialize(event_loop) {
                self.fail(event_loop, err);
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => self.shutdown(event_loop),

            WindowEvent::Resized(new_size) => {
                if let Some(scene) = &mut self.scene {
                    scene.resize(new_size.width, new_size.height);
                }
            }

            WindowEvent::KeyboardInput { event, .. } => {
                if event.state != ElementState::Pressed || event.repeat {
                    return;
                }
                let PhysicalKey::Code(key_code) = event.physical_key else {
                    return;
                };
                match key_code {
                    KeyCode::Escape => self.shutdown(event_loop),
                    KeyCode::Space => {
                        if let Some(scene) = &mut self.scene {
                            if scene.is_running() {
                                scene.stop();
                            } else {
                                scene.start();
                            }
                        }
                    }
                    KeyCode::F11 => {
                        if let Some(window) = &self.window {
                            if window.fullscreen().is_some() {
                                window.set_fullscreen(None);
                            } else {
                                window.set_fullscreen(Some(
                                    winit::window::Fullscreen::Borderless(None),
                                ));
                            }
                        }
                    }
                    _ => {}
                }
            }

            WindowEvent::RedrawRequested => {
                let Some(scene) = &mut self.scene else {
                    return;
                };
                if let Err(err) = scene.tick() {
                    self.fail(event_loop, anyhow!(err).context("Frame failed"));
                }
            }

            _ => {}
        }
    }
}
