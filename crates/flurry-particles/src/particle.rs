//! Particle types: per-instance falling state and the owning arena

use flurry_core::{Rect, Viewport};

/// Velocity units are pixels per 100 ms of elapsed time
pub const VELOCITY_TIME_SCALE_MS: f64 = 100.0;

/// CPU-side state of one falling particle
#[derive(Clone, Debug, PartialEq)]
pub struct Particle {
    pub position: [f32; 2],
    pub size: [f32; 2],
    pub velocity: [f32; 2],
    /// Scene time in ms at which the particle was spawned
    pub spawn_time: f64,
}

impl Particle {
    pub fn new(position: [f32; 2], size: [f32; 2], velocity: [f32; 2], spawn_time: f64) -> Self {
        Self {
            position,
            size,
            velocity,
            spawn_time,
        }
    }

    /// Integrate position over `delta_ms`
    pub fn advance(&mut self, delta_ms: f64) {
        let scale = (delta_ms / VELOCITY_TIME_SCALE_MS) as f32;
        self.position[0] += self.velocity[0] * scale;
        self.position[1] += self.velocity[1] * scale;
    }

    /// Fell past the bottom edge, or drifted fully past the left or right edge
    pub fn is_outside(&self, viewport: Viewport) -> bool {
        self.position[1] >= viewport.height
            || self.position[0] + self.size[0] <= 0.0
            || self.position[0] >= viewport.width
    }

    pub fn rect(&self) -> Rect {
        Rect::from_position_size(self.position, self.size)
    }
}

/// Layer-owned particle storage with O(1) swap-remove.
///
/// Particles are addressed only by index; removal moves the last particle
/// into the vacated slot, so order is not preserved.
#[derive(Default)]
pub struct ParticleArena {
    particles: Vec<Particle>,
}

impl ParticleArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            particles: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn push(&mut self, particle: Particle) -> usize {
        self.particles.push(particle);
        self.particles.len() - 1
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Particle> {
        self.particles.get_mut(index)
    }

    /// Remove the particle at `index`, moving the last one into its slot
    pub fn swap_remove(&mut self, index: usize) -> Particle {
        self.particles.swap_remove(index)
    }

    pub fn as_slice(&self) -> &[Particle] {
        &self.particles
    }
}
