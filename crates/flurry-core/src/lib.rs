//! Flurry Core - Foundational types for the Flurry particle overlay
//!
//! This crate provides the types every other Flurry crate depends on:
//! - `GraphicsDevice` - the device capability the particle core draws through
//! - `Clock` - injectable millisecond time source
//! - `Viewport`, `Rect`, `MotionModel` - shared value types
//! - Error types and Result alias

mod clock;
mod device;
mod error;
mod handle;
mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use device::{
    FrameUniforms, GraphicsDevice, ShaderSources, ShaderStage, TextureImage, VertexLayout,
};
pub use error::{FlurryError, Result};
pub use handle::{BufferHandle, HandleAllocator, TextureHandle};
pub use types::{MotionModel, Rect, Viewport, REFERENCE_WIDTH};
