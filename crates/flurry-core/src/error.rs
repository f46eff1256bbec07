//! Error types for Flurry

use crate::device::ShaderStage;
use thiserror::Error;

/// The main error type for Flurry operations
#[derive(Debug, Error)]
pub enum FlurryError {
    #[error("Graphics context unavailable: {0}")]
    ContextUnavailable(String),

    #[error("Resource creation failed: {0}")]
    ResourceCreationFailed(String),

    #[error("Failed to compile {stage} shader:\n{log}")]
    ShaderCompile { stage: ShaderStage, log: String },

    #[error("Failed to link program: {0}")]
    Link(String),

    #[error("Failed to validate program: {0}")]
    Validate(String),

    #[error("Batch buffer full: capacity is {capacity} quads")]
    BatchFull { capacity: usize },

    #[error("Unknown device handle: {0}")]
    UnknownHandle(String),

    #[error("Draw call failed: {0}")]
    Draw(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Asset error: {0}")]
    Asset(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Flurry operations
pub type Result<T> = std::result::Result<T, FlurryError>;

impl From<toml::de::Error> for FlurryError {
    fn from(err: toml::de::Error) -> Self {
        FlurryError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shader_compile_message_carries_log() {
        let err = FlurryError::ShaderCompile {
            stage: ShaderStage::Fragment,
            log: "expected ';'".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("fragment"));
        assert!(msg.contains("expected ';'"));
    }

    #[test]
    fn toml_errors_become_config_errors() {
        let err: FlurryError = toml::from_str::<toml::Value>("= nope").unwrap_err().into();
        assert!(matches!(err, FlurryError::Config(_)));
    }
}
