//! Scene: the frame driver that owns the device and ticks every layer

use crate::layer::{Layer, LayerConfig};
use crate::rand::mix_seed;
use flurry_core::{
    Clock, FrameUniforms, GraphicsDevice, MotionModel, Result, ShaderSources, TextureImage,
    VertexLayout,
};
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// Diagnostics are reported at most this often
pub const REPORT_INTERVAL_MS: f64 = 1000.0;

const DEFAULT_SEED: u32 = 0x5EED_F1A4;

/// Host display-refresh primitive. The scene asks for the next frame at the
/// start of every running tick; the host answers by calling `Scene::tick`.
pub trait FrameScheduler {
    fn request_frame(&mut self);

    /// Withdraw a pending request, if the host supports it
    fn cancel_frame(&mut self) {}
}

/// Scheduler for tests and offline rendering: requests are only counted.
/// Clones share the same counters.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    pending: Rc<Cell<bool>>,
    requested: Rc<Cell<u32>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.get()
    }

    /// Consume the pending request. Returns whether there was one.
    pub fn take(&self) -> bool {
        self.pending.replace(false)
    }

    /// Total requests made since construction
    pub fn requested(&self) -> u32 {
        self.requested.get()
    }
}

impl FrameScheduler for ManualScheduler {
    fn request_frame(&mut self) {
        self.pending.set(true);
        self.requested.set(self.requested.get() + 1);
    }

    fn cancel_frame(&mut self) {
        self.pending.set(false);
    }
}

/// Snapshot handed to a [`DiagnosticsSink`]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameStats {
    /// Estimate from the last frame delta; 0 when the delta was 0
    pub fps: f64,
    /// Live particles summed over every layer
    pub particles: usize,
    pub layers: usize,
    /// Frames rendered since the scene started
    pub frames: u64,
}

pub trait DiagnosticsSink {
    fn report(&mut self, stats: &FrameStats);
}

/// Writes frame stats to the log at info level
#[derive(Default)]
pub struct LogDiagnostics;

impl DiagnosticsSink for LogDiagnostics {
    fn report(&mut self, stats: &FrameStats) {
        log::info!(
            "fps {:.1}, particles {} across {} layer(s)",
            stats.fps,
            stats.particles,
            stats.layers
        );
    }
}

/// Identifies a layer within its scene
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(u32);

impl LayerId {
    pub fn raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "layer#{}", self.0)
    }
}

/// Outcome of one [`Scene::tick`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameStatus {
    Rendered,
    /// The scene was stopped; nothing was drawn and no frame was requested
    Stopped,
}

/// Owns the device and every layer, and turns refresh callbacks into frames.
///
/// Layers tick in registration order. Dropping the scene releases every
/// remaining layer's device resources.
pub struct Scene<D: GraphicsDevice> {
    device: D,
    clock: Box<dyn Clock>,
    scheduler: Box<dyn FrameScheduler>,
    diagnostics: Option<Box<dyn DiagnosticsSink>>,
    motion: MotionModel,
    layers: Vec<(LayerId, Layer)>,
    next_layer_id: u32,
    seed: u32,
    running: bool,
    last_tick_ms: f64,
    next_report_ms: f64,
    frames: u64,
}

impl<D: GraphicsDevice> Scene<D> {
    /// Install the draw program for `motion` and take ownership of `device`.
    /// Fails on the first compile, link or validation error.
    pub fn new(
        mut device: D,
        motion: MotionModel,
        shaders: &ShaderSources,
        clock: Box<dyn Clock>,
        scheduler: Box<dyn FrameScheduler>,
    ) -> Result<Self> {
        shaders.install(&mut device, VertexLayout::for_motion(motion))?;
        log::info!("Linked {} motion program", motion);

        let now = clock.now_ms();
        Ok(Self {
            device,
            clock,
            scheduler,
            diagnostics: None,
            motion,
            layers: Vec::new(),
            next_layer_id: 0,
            seed: DEFAULT_SEED,
            running: false,
            last_tick_ms: now,
            next_report_ms: now + REPORT_INTERVAL_MS,
            frames: 0,
        })
    }

    /// Seed for layers added from now on
    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_diagnostics(mut self, sink: Box<dyn DiagnosticsSink>) -> Self {
        self.diagnostics = Some(sink);
        self
    }

    pub fn set_diagnostics(&mut self, sink: Option<Box<dyn DiagnosticsSink>>) {
        self.diagnostics = sink;
    }

    /// Create a layer against the current viewport. Its first spawn is due
    /// immediately.
    pub fn add_layer(&mut self, config: LayerConfig, texture: &TextureImage) -> Result<LayerId> {
        let id = LayerId(self.next_layer_id);
        let viewport = self.device.viewport();
        let now = self.clock.now_ms();
        let layer = Layer::new(
            &mut self.device,
            config,
            texture,
            self.motion,
            viewport,
            now,
            mix_seed(self.seed, id.0),
        )?;
        self.next_layer_id += 1;
        self.layers.push((id, layer));
        Ok(id)
    }

    /// Detach a layer and release its device resources
    pub fn remove_layer(&mut self, id: LayerId) -> bool {
        let Some(index) = self.layers.iter().position(|(lid, _)| *lid == id) else {
            return false;
        };
        let (_, layer) = self.layers.remove(index);
        layer.release(&mut self.device);
        true
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers
            .iter()
            .find(|(lid, _)| *lid == id)
            .map(|(_, layer)| layer)
    }

    /// Layers in registration order
    pub fn layers(&self) -> impl Iterator<Item = (LayerId, &Layer)> + '_ {
        self.layers.iter().map(|(id, layer)| (*id, layer))
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Reconfigure the device viewport and every layer's spawn and cull bounds
    pub fn resize(&mut self, width: u32, height: u32) {
        self.device.set_viewport(width, height);
        let viewport = self.device.viewport();
        for (_, layer) in &mut self.layers {
            layer.resize(viewport);
        }
        log::debug!("Viewport resized to {width}x{height}");
    }

    /// Begin running and request the first frame
    pub fn start(&mut self) {
        if self.running {
            return;
        }
        let now = self.clock.now_ms();
        self.running = true;
        self.last_tick_ms = now;
        self.next_report_ms = now + REPORT_INTERVAL_MS;
        self.scheduler.request_frame();
        log::info!("Scene started with {} layer(s)", self.layers.len());
    }

    /// Stop scheduling frames. A tick already in progress is unaffected.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        self.scheduler.cancel_frame();
        log::info!("Scene stopped after {} frame(s)", self.frames);
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Stop and release every layer
    pub fn destroy(&mut self) {
        self.stop();
        for (_, layer) in self.layers.drain(..) {
            layer.release(&mut self.device);
        }
    }

    /// Render one frame: request the next, prepare, tick layers in order,
    /// submit, then report diagnostics if due.
    pub fn tick(&mut self) -> Result<FrameStatus> {
        let now = self.clock.now_ms();
        let delta = now - self.last_tick_ms;
        self.last_tick_ms = now;

        if !self.running {
            return Ok(FrameStatus::Stopped);
        }
        self.scheduler.request_frame();

        let uniforms = FrameUniforms {
            resolution: self.device.viewport().to_array(),
            time_ms: now as f32,
        };
        self.device.prepare_frame(&uniforms)?;
        for (_, layer) in &mut self.layers {
            layer.tick(now, delta, &mut self.device)?;
        }
        self.device.finish_frame()?;
        self.frames += 1;

        if now >= self.next_report_ms {
            self.next_report_ms = now + REPORT_INTERVAL_MS;
            if let Some(sink) = self.diagnostics.as_mut() {
                let stats = FrameStats {
                    fps: if delta > 0.0 { 1000.0 / delta } else { 0.0 },
                    particles: self.layers.iter().map(|(_, l)| l.particle_count()).sum(),
                    layers: self.layers.len(),
                    frames: self.frames,
                };
                sink.report(&stats);
            }
        }

        Ok(FrameStatus::Rendered)
    }

    /// Live particles across every layer
    pub fn particle_count(&self) -> usize {
        self.layers.iter().map(|(_, l)| l.particle_count()).sum()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn motion(&self) -> MotionModel {
        self.motion
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }
}

impl<D: GraphicsDevice> Drop for Scene<D> {
    fn drop(&mut self) {
        for (_, layer) in self.layers.drain(..) {
            layer.release(&mut self.device);
        }
    }
}
