//! Layers: one particle size class with its own cadence, batch and texture

use crate::batch::{BatchBuffer, TimedAttributes, MAX_QUADS_PER_BATCH};
use crate::particle::{Particle, ParticleArena};
use crate::rand::ParticleRng;
use flurry_core::{
    FlurryError, GraphicsDevice, MotionModel, Result, TextureHandle, TextureImage, Viewport,
    REFERENCE_WIDTH,
};

/// Vertical speed of every spawned particle, pixels per 100 ms
pub const FALL_SPEED: f32 = 5.0;

/// Horizontal drift is drawn uniformly from `[-MAX_DRIFT, MAX_DRIFT)`
pub const MAX_DRIFT: f32 = 1.0;

/// Construction parameters for one layer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerConfig {
    /// Edge length of each particle in pixels
    pub size: f32,
    /// Requested spawn interval in ms at the reference viewport width
    pub rate_ms: f32,
    /// Particles created per spawn event
    pub spawn_count: u32,
}

/// Spawn interval in ms, normalized by viewport width.
///
/// Narrower viewports get a proportionally longer interval, so the same
/// requested rate gives the same apparent density at any width.
pub fn compute_interval(viewport_width: f32, requested_rate_ms: f32) -> f64 {
    (REFERENCE_WIDTH as f64 / viewport_width as f64) * requested_rate_ms as f64
}

/// Lifetime counters for one layer
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LayerStats {
    pub spawn_events: u64,
    pub spawned: u64,
    /// Spawns discarded because a write-once buffer was full
    pub dropped: u64,
    /// Particles detached after leaving the viewport
    pub removed: u64,
    /// Extra draw calls issued because a frame overflowed the batch
    pub overflow_flushes: u64,
}

pub struct Layer {
    config: LayerConfig,
    motion: MotionModel,
    interval_ms: f64,
    next_spawn_at: f64,
    viewport: Viewport,
    buffer: BatchBuffer,
    texture: TextureHandle,
    /// Live particles; always empty under the GPU model
    particles: ParticleArena,
    rng: ParticleRng,
    stats: LayerStats,
    warned_full: bool,
}

impl Layer {
    /// Create the layer's device buffer and texture. The first spawn is due
    /// at `now_ms`.
    pub fn new(
        device: &mut dyn GraphicsDevice,
        config: LayerConfig,
        texture: &TextureImage,
        motion: MotionModel,
        viewport: Viewport,
        now_ms: f64,
        seed: u32,
    ) -> Result<Self> {
        if !(viewport.width > 0.0) {
            return Err(FlurryError::Config(format!(
                "viewport width must be positive, got {}",
                viewport.width
            )));
        }
        if !(config.size > 0.0) || !config.size.is_finite() {
            return Err(FlurryError::Config(format!(
                "particle size must be positive, got {}",
                config.size
            )));
        }
        if !(config.rate_ms >= 0.0) || !config.rate_ms.is_finite() {
            return Err(FlurryError::Config(format!(
                "spawn rate must be a non-negative number of ms, got {}",
                config.rate_ms
            )));
        }

        let buffer = BatchBuffer::new(device, motion, MAX_QUADS_PER_BATCH)?;
        let texture = match device.create_texture(texture) {
            Ok(handle) => handle,
            Err(e) => {
                buffer.release(device);
                return Err(e);
            }
        };

        let interval_ms = compute_interval(viewport.width, config.rate_ms);
        log::debug!(
            "Layer size {} every {:.1}ms x{} ({} motion)",
            config.size,
            interval_ms,
            config.spawn_count,
            motion
        );

        let particles = match motion {
            MotionModel::Cpu => ParticleArena::with_capacity(MAX_QUADS_PER_BATCH),
            MotionModel::Gpu => ParticleArena::new(),
        };

        Ok(Self {
            config,
            motion,
            interval_ms,
            next_spawn_at: now_ms,
            viewport,
            buffer,
            texture,
            particles,
            rng: ParticleRng::new(seed),
            stats: LayerStats::default(),
            warned_full: false,
        })
    }

    /// Advance one frame: spawn if due, move live particles (CPU model),
    /// then flush the batch as one draw call.
    pub fn tick(&mut self, now_ms: f64, delta_ms: f64, device: &mut dyn GraphicsDevice) -> Result<()> {
        if now_ms >= self.next_spawn_at {
            self.next_spawn_at = now_ms + self.interval_ms;
            self.spawn(now_ms)?;
        }

        if self.motion == MotionModel::Cpu {
            self.update_particles(delta_ms, device)?;
        }

        self.buffer.flush(device, self.texture)
    }

    fn spawn(&mut self, now_ms: f64) -> Result<()> {
        self.stats.spawn_events += 1;
        let size = self.config.size;

        for _ in 0..self.config.spawn_count {
            let x = self.rng.range(0.0, self.viewport.width - size);
            let drift = self.rng.range(-MAX_DRIFT, MAX_DRIFT);
            let particle = Particle::new([x, -size], [size, size], [drift, FALL_SPEED], now_ms);

            match self.motion {
                MotionModel::Cpu => {
                    self.particles.push(particle);
                    self.stats.spawned += 1;
                }
                MotionModel::Gpu => self.write_once(&particle)?,
            }
        }
        Ok(())
    }

    /// GPU model: the quad is the only record of the particle
    fn write_once(&mut self, particle: &Particle) -> Result<()> {
        let extra = TimedAttributes {
            velocity: particle.velocity,
            spawn_time: particle.spawn_time as f32,
        };
        match self.buffer.append(particle.rect(), Some(extra)) {
            Ok(_) => {
                self.stats.spawned += 1;
                Ok(())
            }
            Err(FlurryError::BatchFull { capacity }) => {
                self.stats.dropped += 1;
                if !self.warned_full {
                    self.warned_full = true;
                    log::warn!(
                        "Layer size {} filled its {} quad buffer; new spawns are dropped",
                        self.config.size,
                        capacity
                    );
                }
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// CPU model: integrate, cull, and rewrite every live quad
    fn update_particles(&mut self, delta_ms: f64, device: &mut dyn GraphicsDevice) -> Result<()> {
        let mut i = 0;
        while i < self.particles.len() {
            let rect = match self.particles.get_mut(i) {
                Some(p) => {
                    p.advance(delta_ms);
                    if p.is_outside(self.viewport) {
                        None
                    } else {
                        Some(p.rect())
                    }
                }
                None => break,
            };

            let Some(rect) = rect else {
                // Swapped-in particle lands at `i` and is visited next
                self.particles.swap_remove(i);
                self.stats.removed += 1;
                continue;
            };

            if self.buffer.is_full() {
                self.buffer.flush(device, self.texture)?;
                self.stats.overflow_flushes += 1;
            }
            self.buffer.append(rect, None)?;
            i += 1;
        }
        Ok(())
    }

    /// Track a new viewport size. The spawn interval keeps the value computed
    /// at construction; only the spawn range and culling bounds change.
    pub fn resize(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    /// Live particles: tracked particles under the CPU model, written quads
    /// under the GPU model
    pub fn particle_count(&self) -> usize {
        match self.motion {
            MotionModel::Cpu => self.particles.len(),
            MotionModel::Gpu => self.buffer.written_quads(),
        }
    }

    pub fn config(&self) -> &LayerConfig {
        &self.config
    }

    pub fn motion(&self) -> MotionModel {
        self.motion
    }

    pub fn interval_ms(&self) -> f64 {
        self.interval_ms
    }

    pub fn next_spawn_at(&self) -> f64 {
        self.next_spawn_at
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn buffer(&self) -> &BatchBuffer {
        &self.buffer
    }

    pub fn texture(&self) -> TextureHandle {
        self.texture
    }

    pub fn particles(&self) -> &[Particle] {
        self.particles.as_slice()
    }

    pub fn stats(&self) -> LayerStats {
        self.stats
    }

    /// Give the buffer and texture back to the device. Consumes the layer.
    pub fn release(self, device: &mut dyn GraphicsDevice) {
        self.buffer.release(device);
        device.release_texture(self.texture);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{DeviceCall, RecordingDevice};

    fn layer(device: &mut RecordingDevice, config: LayerConfig, motion: MotionModel) -> Layer {
        let viewport = device.viewport();
        Layer::new(device, config, &TextureImage::white(), motion, viewport, 0.0, 42).unwrap()
    }

    fn small_flakes() -> LayerConfig {
        LayerConfig {
            size: 3.0,
            rate_ms: 100.0,
            spawn_count: 3,
        }
    }

    #[test]
    fn interval_scales_inversely_with_width() {
        for rate in [1.0_f32, 100.0, 150.0, 33.3] {
            let r = rate as f64;
            assert_eq!(compute_interval(1920.0, rate), r);
            assert_eq!(compute_interval(960.0, rate), 2.0 * r);
            assert_eq!(compute_interval(3840.0, rate), 0.5 * r);
        }
    }

    #[test]
    fn one_second_of_ticks_spawns_ten_events() {
        for motion in [MotionModel::Cpu, MotionModel::Gpu] {
            let mut device = RecordingDevice::with_viewport(Viewport::new(1920.0, 1080.0));
            let mut layer = layer(&mut device, small_flakes(), motion);
            assert_eq!(layer.interval_ms(), 100.0);

            let mut t = 0.0;
            while t < 1000.0 {
                layer.tick(t, 10.0, &mut device).unwrap();
                t += 10.0;
            }
            assert_eq!(layer.stats().spawn_events, 10, "{motion} model");
            assert_eq!(layer.stats().spawned, 30, "{motion} model");
        }
    }

    #[test]
    fn spawn_positions_start_above_viewport() {
        let mut device = RecordingDevice::with_viewport(Viewport::new(200.0, 100.0));
        let config = LayerConfig {
            size: 10.0,
            rate_ms: 0.0,
            spawn_count: 50,
        };
        let mut layer = layer(&mut device, config, MotionModel::Cpu);
        for frame in 0..20 {
            layer.tick(frame as f64, 0.0, &mut device).unwrap();
        }
        assert_eq!(layer.particles().len(), 1000);
        for p in layer.particles() {
            assert!(p.position[0] >= 0.0 && p.position[0] < 190.0);
            assert_eq!(p.position[1], -10.0);
            assert!(p.velocity[0] >= -1.0 && p.velocity[0] < 1.0);
            assert_eq!(p.velocity[1], FALL_SPEED);
        }
    }

    #[test]
    fn gpu_quads_carry_spawn_state() {
        let mut device = RecordingDevice::with_viewport(Viewport::new(640.0, 480.0));
        let mut layer = layer(&mut device, small_flakes(), MotionModel::Gpu);
        layer.tick(250.0, 16.0, &mut device).unwrap();

        assert!(layer.particles().is_empty());
        let verts = layer.buffer().timed_vertices().unwrap();
        assert_eq!(verts.len(), 18);
        for quad in verts.chunks(6) {
            let top_left = quad[0];
            assert!(top_left.position[0] >= 0.0 && top_left.position[0] < 637.0);
            assert_eq!(top_left.position[1], -3.0);
            assert_eq!(top_left.spawn_time, 250.0);
            assert_eq!(top_left.velocity[1], FALL_SPEED);
        }
    }

    #[test]
    fn falling_particle_removed_on_first_tick_past_bottom() {
        let mut device = RecordingDevice::with_viewport(Viewport::new(1920.0, 100.0));
        let config = LayerConfig {
            size: 3.0,
            rate_ms: 100.0,
            spawn_count: 0,
        };
        let mut layer = layer(&mut device, config, MotionModel::Cpu);
        layer
            .particles
            .push(Particle::new([500.0, 0.0], [3.0, 3.0], [0.0, 5.0], 0.0));

        // 19 ticks of 100ms: y = 95, still visible
        for n in 1..20 {
            layer.tick(n as f64 * 100.0, 100.0, &mut device).unwrap();
            assert_eq!(layer.particle_count(), 1, "tick {n}");
        }
        // 20th tick reaches y = 100 >= height
        layer.tick(2000.0, 100.0, &mut device).unwrap();
        assert_eq!(layer.particle_count(), 0);
        assert_eq!(layer.stats().removed, 1);
    }

    #[test]
    fn drifting_particles_removed_at_side_edges() {
        let mut device = RecordingDevice::with_viewport(Viewport::new(100.0, 1000.0));
        let config = LayerConfig {
            size: 3.0,
            rate_ms: 100.0,
            spawn_count: 0,
        };
        let mut layer = layer(&mut device, config, MotionModel::Cpu);
        layer
            .particles
            .push(Particle::new([1.0, 0.0], [3.0, 3.0], [-1.0, 0.0], 0.0));
        layer
            .particles
            .push(Particle::new([98.0, 0.0], [3.0, 3.0], [1.0, 0.0], 0.0));
        layer
            .particles
            .push(Particle::new([50.0, 0.0], [3.0, 3.0], [0.0, 0.0], 0.0));

        layer.tick(0.0, 400.0, &mut device).unwrap();
        assert_eq!(layer.particle_count(), 1);
        assert_eq!(layer.particles()[0].position[0], 50.0);
    }

    #[test]
    fn cpu_tick_flushes_and_resets_buffer() {
        let mut device = RecordingDevice::new();
        let mut layer = layer(&mut device, small_flakes(), MotionModel::Cpu);
        layer.tick(0.0, 16.0, &mut device).unwrap();
        assert_eq!(layer.buffer().written_quads(), 0);
        assert_eq!(device.draw_counts(), vec![18]);
    }

    #[test]
    fn cpu_overflow_flushes_mid_frame() {
        let mut device = RecordingDevice::new();
        let config = LayerConfig {
            size: 1.0,
            rate_ms: 1000.0,
            spawn_count: 1500,
        };
        let mut layer = layer(&mut device, config, MotionModel::Cpu);
        layer.tick(0.0, 0.0, &mut device).unwrap();

        assert_eq!(layer.particle_count(), 1500);
        assert_eq!(device.draw_counts(), vec![6000, 3000]);
        assert_eq!(layer.stats().overflow_flushes, 1);
    }

    #[test]
    fn gpu_overflow_drops_new_spawns() {
        let mut device = RecordingDevice::new();
        let config = LayerConfig {
            size: 1.0,
            rate_ms: 0.0,
            spawn_count: 600,
        };
        let mut layer = layer(&mut device, config, MotionModel::Gpu);
        layer.tick(0.0, 16.0, &mut device).unwrap();
        layer.tick(16.0, 16.0, &mut device).unwrap();

        assert_eq!(layer.particle_count(), 1000);
        assert_eq!(layer.stats().spawned, 1000);
        assert_eq!(layer.stats().dropped, 200);
        // Accumulated quads are redrawn every frame
        assert_eq!(device.draw_counts(), vec![3600, 6000]);
    }

    #[test]
    fn resize_keeps_interval() {
        let mut device = RecordingDevice::with_viewport(Viewport::new(1920.0, 1080.0));
        let mut layer = layer(&mut device, small_flakes(), MotionModel::Cpu);
        layer.resize(Viewport::new(960.0, 540.0));
        assert_eq!(layer.interval_ms(), 100.0);
        assert_eq!(layer.viewport().width, 960.0);
    }

    #[test]
    fn release_returns_device_resources() {
        let mut device = RecordingDevice::new();
        let layer = layer(&mut device, small_flakes(), MotionModel::Cpu);
        assert_eq!(device.live_buffers(), 1);
        assert_eq!(device.live_textures(), 1);
        let (buffer, texture) = (layer.buffer().handle(), layer.texture());

        layer.release(&mut device);
        assert_eq!(device.live_buffers(), 0);
        assert_eq!(device.live_textures(), 0);
        let releases: Vec<_> = device
            .calls()
            .iter()
            .filter(|c| matches!(c, DeviceCall::ReleaseBuffer(_) | DeviceCall::ReleaseTexture(_)))
            .cloned()
            .collect();
        assert_eq!(
            releases,
            vec![DeviceCall::ReleaseBuffer(buffer), DeviceCall::ReleaseTexture(texture)]
        );
    }

    #[test]
    fn rejects_invalid_config() {
        let mut device = RecordingDevice::new();
        let bad_size = LayerConfig {
            size: 0.0,
            ..small_flakes()
        };
        let result = Layer::new(
            &mut device,
            bad_size,
            &TextureImage::white(),
            MotionModel::Cpu,
            Viewport::new(800.0, 600.0),
            0.0,
            1,
        );
        assert!(matches!(result, Err(FlurryError::Config(_))));

        let result = Layer::new(
            &mut device,
            small_flakes(),
            &TextureImage::white(),
            MotionModel::Cpu,
            Viewport::new(0.0, 600.0),
            0.0,
            1,
        );
        assert!(matches!(result, Err(FlurryError::Config(_))));
        assert_eq!(device.live_buffers(), 0);
    }
}
