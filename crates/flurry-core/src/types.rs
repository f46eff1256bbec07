//! Spatial and common types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Width of the viewport that spawn cadences are authored against
pub const REFERENCE_WIDTH: f32 = 1920.0;

/// Size of the host display surface in pixels
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn from_pixels(width: u32, height: u32) -> Self {
        Self {
            width: width as f32,
            height: height as f32,
        }
    }

    pub fn to_array(&self) -> [f32; 2] {
        [self.width, self.height]
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(REFERENCE_WIDTH, 1080.0)
    }
}

/// Axis-aligned rectangle in viewport pixels (y grows downward)
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Rect {
    pub const fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Rectangle with its top-left corner at `position`
    pub fn from_position_size(position: [f32; 2], size: [f32; 2]) -> Self {
        Self {
            left: position[0],
            top: position[1],
            right: position[0] + size[0],
            bottom: position[1] + size[1],
        }
    }
}

/// How particle positions advance between frames.
///
/// Exactly one model is active per deployment; it fixes the vertex layout
/// and the shader program pair.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MotionModel {
    /// Positions integrated on the CPU, buffer rebuilt every frame
    #[default]
    Cpu,
    /// Quads written once at spawn, displaced in the vertex stage by elapsed time
    Gpu,
}

impl MotionModel {
    pub fn label(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Gpu => "gpu",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cpu" => Some(Self::Cpu),
            "gpu" => Some(Self::Gpu),
            _ => None,
        }
    }
}

impl fmt::Display for MotionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
