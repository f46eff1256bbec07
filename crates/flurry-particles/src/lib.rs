//! Flurry Particles - batched falling-particle layers
//!
//! Provides the particle core the renderer and CLI drive:
//! - Fixed-capacity quad batches, one draw call per flush
//! - CPU-integrated or GPU time-driven particle motion
//! - Width-normalized spawn scheduling per size class
//! - A frame driver with injectable clock, scheduler and diagnostics

pub mod batch;
pub mod config;
pub mod layer;
pub mod particle;
pub mod rand;
pub mod recording;
pub mod scene;

pub use batch::{BatchBuffer, QuadVertex, TimedAttributes, TimedQuadVertex, MAX_QUADS_PER_BATCH};
pub use config::{EmitterOptions, Multipliers, ParticleKind, SpawningMultipliers};
pub use layer::{compute_interval, Layer, LayerConfig, LayerStats};
pub use particle::{Particle, ParticleArena};
pub use recording::{DeviceCall, RecordingDevice};
pub use scene::{
    DiagnosticsSink, FrameScheduler, FrameStats, FrameStatus, LayerId, LogDiagnostics,
    ManualScheduler, Scene,
};
