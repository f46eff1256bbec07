//! CLI command implementations

pub mod options;
pub mod play;
pub mod render;
